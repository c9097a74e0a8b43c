//! Frame-index timestamp formatting for CSV export.

/// Format the time offset of a frame as `HH:MM:SS.ffffff`.
///
/// The offset is `frameindex / fps` seconds from the start of the video,
/// with six fractional digits.
///
/// # Examples
/// ```
/// use finscan_models::timestamp::format_frame_time;
/// assert_eq!(format_frame_time(0, 10.0), "00:00:00.000000");
/// assert_eq!(format_frame_time(15, 10.0), "00:00:01.500000");
/// ```
pub fn format_frame_time(frameindex: usize, fps: f64) -> String {
    let total_secs = frameindex as f64 / fps;
    let mut whole = total_secs.floor() as u64;
    let mut micros = ((total_secs - total_secs.floor()) * 1_000_000.0).round() as u64;
    if micros >= 1_000_000 {
        micros -= 1_000_000;
        whole += 1;
    }

    let hours = whole / 3600;
    let mins = (whole % 3600) / 60;
    let secs = whole % 60;
    format!("{:02}:{:02}:{:02}.{:06}", hours, mins, secs, micros)
}

//! Per-pixel adaptive Gaussian-mixture background model.
//!
//! Each pixel independently tracks up to `n_mixtures` weighted Gaussian
//! components (mean intensity, variance, weight), re-estimated on every
//! `apply` call with an exponentially decaying update controlled by the
//! learning rate. Pixels explained by the most probable stable components
//! are background; everything else is foreground. Shadow detection is not
//! implemented, the mask is strictly binary.

use image::GrayImage;

/// Tuning parameters for the mixture model.
///
/// Defaults follow the standard adaptive-mixture values that work well on
/// underwater footage: the generation threshold (`var_threshold_gen`) is
/// stricter than the steady-state threshold (`var_threshold`), so a sample
/// can be foreground yet still spawn no new component.
#[derive(Debug, Clone, Copy)]
pub struct MogParams {
    /// Maximum number of Gaussian components per pixel.
    pub n_mixtures: usize,
    /// Fraction of total weight considered stable background.
    pub background_ratio: f32,
    /// Complexity-reduction prune constant (cT); components whose weight
    /// decays below `alpha * cT` are removed.
    pub complexity_reduction: f32,
    /// Squared-distance threshold (in variances) for the background test.
    pub var_threshold: f32,
    /// Stricter threshold governing new-component admission.
    pub var_threshold_gen: f32,
    /// Variance assigned to a newly created component.
    pub var_init: f32,
    /// Lower variance clamp.
    pub var_min: f32,
    /// Upper variance clamp.
    pub var_max: f32,
}

impl Default for MogParams {
    fn default() -> Self {
        Self {
            n_mixtures: 5,
            background_ratio: 0.9,
            complexity_reduction: 0.05,
            var_threshold: 16.0,
            var_threshold_gen: 9.0,
            var_init: 15.0,
            var_min: 4.0,
            var_max: 75.0,
        }
    }
}

/// Adaptive background model over a fixed-size grayscale frame.
pub struct BackgroundModel {
    width: u32,
    height: u32,
    params: MogParams,
    /// Number of active components per pixel.
    modes: Vec<u8>,
    /// Component state, `n_mixtures` slots per pixel, kept sorted by
    /// descending weight within each pixel.
    weight: Vec<f32>,
    mean: Vec<f32>,
    var: Vec<f32>,
}

impl BackgroundModel {
    pub fn new(width: u32, height: u32, params: MogParams) -> Self {
        let slots = (width * height) as usize * params.n_mixtures;
        Self {
            width,
            height,
            params,
            modes: vec![0; (width * height) as usize],
            weight: vec![0.0; slots],
            mean: vec![0.0; slots],
            var: vec![0.0; slots],
        }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Seed the model from the per-pixel mean of the given frames.
    ///
    /// Averaging the first frames instead of taking the first one alone
    /// reduces sensitivity to any single noisy or compression-artifacted
    /// frame. The synthetic mean image is applied once with a learning
    /// rate of 1, fully reinitializing every pixel.
    pub fn seed(&mut self, frames: &[GrayImage]) {
        if frames.is_empty() {
            return;
        }
        let npix = (self.width * self.height) as usize;
        let mut acc = vec![0.0f64; npix];
        for frame in frames {
            debug_assert_eq!(frame.dimensions(), (self.width, self.height));
            for (a, &v) in acc.iter_mut().zip(frame.as_raw().iter()) {
                *a += v as f64;
            }
        }
        let n = frames.len() as f64;
        let mut mean = GrayImage::new(self.width, self.height);
        for (out, a) in mean.iter_mut().zip(acc.iter()) {
            *out = (a / n).round().clamp(0.0, 255.0) as u8;
        }
        self.apply(&mean, 1.0);
    }

    /// Classify a frame into foreground (255) and background (0),
    /// updating the mixture at the given learning rate.
    ///
    /// Rate 1 fully reinitializes each pixel from the current frame;
    /// rate 0 classifies without touching the model.
    pub fn apply(&mut self, frame: &GrayImage, learning_rate: f32) -> GrayImage {
        debug_assert_eq!(frame.dimensions(), (self.width, self.height));
        let mut mask = GrayImage::new(self.width, self.height);
        for (px, (&value, out)) in frame.as_raw().iter().zip(mask.iter_mut()).enumerate() {
            let foreground = self.update_pixel(px, value as f32, learning_rate);
            *out = if foreground { 255 } else { 0 };
        }
        mask
    }

    /// Current background estimate: per pixel, the weighted mean of the
    /// stable components within the background ratio.
    pub fn background_image(&self) -> GrayImage {
        let mut bg = GrayImage::new(self.width, self.height);
        for (px, out) in bg.iter_mut().enumerate() {
            let base = px * self.params.n_mixtures;
            let nmodes = self.modes[px] as usize;
            let mut cumulative = 0.0f32;
            let mut acc = 0.0f32;
            for m in 0..nmodes {
                let idx = base + m;
                acc += self.weight[idx] * self.mean[idx];
                cumulative += self.weight[idx];
                if cumulative >= self.params.background_ratio {
                    break;
                }
            }
            if cumulative > 0.0 {
                *out = (acc / cumulative).round().clamp(0.0, 255.0) as u8;
            }
        }
        bg
    }

    /// Update one pixel's mixture and report whether the sample is
    /// foreground.
    fn update_pixel(&mut self, px: usize, value: f32, alpha: f32) -> bool {
        let k_max = self.params.n_mixtures;
        let base = px * k_max;

        if alpha >= 1.0 {
            self.modes[px] = 1;
            self.weight[base] = 1.0;
            self.mean[base] = value;
            self.var[base] = self.params.var_init;
            return false;
        }

        let nmodes = self.modes[px] as usize;

        // Classify against the pre-update mixture: a sample is background
        // if some component explains it before the cumulative weight
        // (descending order) passes the background ratio.
        let mut background = false;
        let mut cumulative = 0.0f32;
        for m in 0..nmodes {
            if cumulative >= self.params.background_ratio {
                break;
            }
            let idx = base + m;
            let d = value - self.mean[idx];
            if d * d < self.params.var_threshold * self.var[idx] {
                background = true;
                break;
            }
            cumulative += self.weight[idx];
        }

        if alpha <= 0.0 {
            // frozen model
            return !background;
        }

        // Exponential decay plus the complexity-reduction prune term.
        let alpha1 = 1.0 - alpha;
        let prune = alpha * self.params.complexity_reduction;
        let mut matched: Option<usize> = None;
        for m in 0..nmodes {
            let idx = base + m;
            let mut w = alpha1 * self.weight[idx] - prune;
            if matched.is_none() {
                let d = value - self.mean[idx];
                let dist2 = d * d;
                if dist2 < self.params.var_threshold_gen * self.var[idx] {
                    matched = Some(m);
                    w += alpha;
                    let k = alpha / w;
                    self.mean[idx] += k * d;
                    self.var[idx] = (self.var[idx] + k * (dist2 - self.var[idx]))
                        .clamp(self.params.var_min, self.params.var_max);
                }
            }
            self.weight[idx] = w.max(0.0);
        }

        // Drop pruned components, compacting the remainder.
        let mut kept = 0usize;
        for m in 0..nmodes {
            let idx = base + m;
            if self.weight[idx] > prune || matched == Some(m) {
                if kept != m {
                    let dst = base + kept;
                    self.weight[dst] = self.weight[idx];
                    self.mean[dst] = self.mean[idx];
                    self.var[dst] = self.var[idx];
                    if matched == Some(m) {
                        matched = Some(kept);
                    }
                }
                kept += 1;
            }
        }
        let mut nmodes = kept;

        // Admit a new component when nothing matched, replacing the
        // weakest one at the cap.
        if matched.is_none() {
            let slot = if nmodes == k_max {
                k_max - 1
            } else {
                nmodes += 1;
                nmodes - 1
            };
            let idx = base + slot;
            self.weight[idx] = if nmodes == 1 { 1.0 } else { alpha };
            self.mean[idx] = value;
            self.var[idx] = self.params.var_init;
            matched = Some(slot);
        }

        // Renormalize and restore the descending-weight order.
        let mut total = 0.0f32;
        for m in 0..nmodes {
            total += self.weight[base + m];
        }
        if total > 0.0 {
            for m in 0..nmodes {
                self.weight[base + m] /= total;
            }
        }
        if let Some(matched) = matched {
            let mut m = matched;
            while m > 0 && self.weight[base + m] > self.weight[base + m - 1] {
                self.weight.swap(base + m, base + m - 1);
                self.mean.swap(base + m, base + m - 1);
                self.var.swap(base + m, base + m - 1);
                m -= 1;
            }
        }

        self.modes[px] = nmodes as u8;
        !background
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat_frame(w: u32, h: u32, value: u8) -> GrayImage {
        GrayImage::from_pixel(w, h, image::Luma([value]))
    }

    fn foreground_count(mask: &GrayImage) -> usize {
        mask.as_raw().iter().filter(|&&p| p != 0).count()
    }

    #[test]
    fn identical_frames_converge_to_zero_foreground() {
        let mut model = BackgroundModel::new(32, 24, MogParams::default());
        let frame = flat_frame(32, 24, 80);
        model.seed(&vec![frame.clone(); 10]);
        let mut last = 0;
        for _ in 0..20 {
            let mask = model.apply(&frame, 0.05);
            last = foreground_count(&mask);
        }
        assert_eq!(last, 0);
    }

    #[test]
    fn learning_rate_one_reinitializes() {
        let mut model = BackgroundModel::new(8, 8, MogParams::default());
        model.seed(&[flat_frame(8, 8, 10)]);
        // Hard scene change, fully re-seed.
        let mask = model.apply(&flat_frame(8, 8, 240), 1.0);
        assert_eq!(foreground_count(&mask), 0);
        // The new scene is now background.
        let mask = model.apply(&flat_frame(8, 8, 240), 0.05);
        assert_eq!(foreground_count(&mask), 0);
        // And the old one is not.
        let mask = model.apply(&flat_frame(8, 8, 10), 0.05);
        assert_eq!(foreground_count(&mask), 64);
    }

    #[test]
    fn learning_rate_zero_freezes_the_model() {
        let mut model = BackgroundModel::new(8, 8, MogParams::default());
        model.seed(&[flat_frame(8, 8, 50)]);
        // With rate 0 a novel intensity never gets absorbed.
        for _ in 0..50 {
            let mask = model.apply(&flat_frame(8, 8, 200), 0.0);
            assert_eq!(foreground_count(&mask), 64);
        }
    }

    #[test]
    fn novel_region_is_foreground() {
        let mut model = BackgroundModel::new(32, 32, MogParams::default());
        let bg = flat_frame(32, 32, 60);
        model.seed(&vec![bg.clone(); 10]);
        for _ in 0..5 {
            model.apply(&bg, 0.05);
        }

        let mut frame = bg.clone();
        for y in 10..20 {
            for x in 10..20 {
                frame.put_pixel(x, y, image::Luma([220]));
            }
        }
        let mask = model.apply(&frame, 0.05);
        assert_eq!(foreground_count(&mask), 100);
        assert_eq!(mask.get_pixel(15, 15)[0], 255);
        assert_eq!(mask.get_pixel(5, 5)[0], 0);
    }

    #[test]
    fn background_image_tracks_the_scene() {
        let mut model = BackgroundModel::new(8, 8, MogParams::default());
        model.seed(&vec![flat_frame(8, 8, 90); 10]);
        let bg = model.background_image();
        assert_eq!(bg.get_pixel(3, 3)[0], 90);
    }
}

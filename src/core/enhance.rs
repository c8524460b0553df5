use crate::types::{EnhancedImagery, IntensityGrid, RawImagery, SarError, SarResult};
use ndarray::Array2;

const BINS: usize = 256;

/// Enhancement parameters
#[derive(Debug, Clone)]
pub struct EnhancementParams {
    /// Median filter window size (must be odd)
    pub median_window: usize,
    /// CLAHE tile columns
    pub clahe_tiles_x: usize,
    /// CLAHE tile rows
    pub clahe_tiles_y: usize,
    /// CLAHE clip limit, relative to a uniform histogram
    pub clahe_clip_limit: f32,
}

impl Default for EnhancementParams {
    fn default() -> Self {
        Self {
            median_window: 3,        // 3x3 neighborhood
            clahe_tiles_x: 8,        // 8x8 tile grid
            clahe_tiles_y: 8,
            clahe_clip_limit: 2.0,
        }
    }
}

/// Fixed-order enhancement chain for single-channel radar rasters:
/// global equalization, median denoise, then CLAHE.
///
/// Denoising has to run before the local contrast stage or the speckle
/// gets amplified tile by tile.
pub struct EnhancementPipeline {
    params: EnhancementParams,
}

impl EnhancementPipeline {
    /// Create a pipeline with the standard parameters
    pub fn new() -> Self {
        Self {
            params: EnhancementParams::default(),
        }
    }

    /// Create a pipeline with custom parameters
    pub fn with_params(params: EnhancementParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &EnhancementParams {
        &self.params
    }

    /// Run the full chain; the input raster is left untouched
    pub fn enhance(&self, raw: &RawImagery) -> SarResult<EnhancedImagery> {
        let (height, width) = raw.pixels.dim();
        if height == 0 || width == 0 {
            return Err(SarError::ImageLoad(format!(
                "cannot enhance an empty {}x{} raster",
                width, height
            )));
        }

        log::info!("Enhancing {}x{} raster", width, height);
        log::debug!("Enhancement parameters: {:?}", self.params);

        let equalized = equalize_histogram(&raw.pixels);
        let denoised = median_filter(&equalized, self.params.median_window)?;
        let clahe = Clahe::new(
            self.params.clahe_clip_limit,
            self.params.clahe_tiles_x,
            self.params.clahe_tiles_y,
        )?;
        let pixels = clahe.apply(&denoised);

        log::info!("Enhancement completed successfully");
        Ok(EnhancedImagery { pixels })
    }
}

impl Default for EnhancementPipeline {
    fn default() -> Self {
        Self::new()
    }
}

fn histogram<'a>(values: impl IntoIterator<Item = &'a u8>) -> [u32; BINS] {
    let mut hist = [0u32; BINS];
    for &v in values {
        hist[v as usize] += 1;
    }
    hist
}

/// Global histogram equalization
///
/// The lowest occupied bin maps to 0 and the cumulative distribution above
/// it is stretched over [0, 255]. A constant image is returned unchanged.
pub fn equalize_histogram(image: &IntensityGrid) -> IntensityGrid {
    let total = image.len() as u64;
    if total == 0 {
        return image.clone();
    }

    let hist = histogram(image.iter());
    let Some(first) = hist.iter().position(|&count| count > 0) else {
        return image.clone();
    };

    let first_count = hist[first] as u64;
    if first_count == total {
        return image.clone();
    }

    let scale = 255.0 / (total - first_count) as f64;
    let mut lut = [0u8; BINS];
    let mut sum = 0u64;
    for (bin, count) in hist.iter().enumerate().skip(first + 1) {
        sum += *count as u64;
        lut[bin] = (sum as f64 * scale).round().min(255.0) as u8;
    }

    image.mapv(|v| lut[v as usize])
}

/// Median filter with replicated borders
pub fn median_filter(image: &IntensityGrid, window_size: usize) -> SarResult<IntensityGrid> {
    if window_size == 0 || window_size % 2 == 0 {
        return Err(SarError::ImageLoad(format!(
            "median window size must be odd, got {}",
            window_size
        )));
    }

    let (height, width) = image.dim();
    let half_window = (window_size / 2) as isize;
    let mut filtered = Array2::zeros((height, width));
    let mut window_values = Vec::with_capacity(window_size * window_size);

    for i in 0..height {
        for j in 0..width {
            window_values.clear();

            for di in -half_window..=half_window {
                let ii = clamp_index(i as isize + di, height);
                for dj in -half_window..=half_window {
                    let jj = clamp_index(j as isize + dj, width);
                    window_values.push(image[[ii, jj]]);
                }
            }

            let mid = window_values.len() / 2;
            let (_, median, _) = window_values.select_nth_unstable(mid);
            filtered[[i, j]] = *median;
        }
    }

    Ok(filtered)
}

fn clamp_index(index: isize, len: usize) -> usize {
    index.clamp(0, len as isize - 1) as usize
}

/// Reflect an out-of-range index back into `0..len` without repeating the edge
fn reflect_101(index: usize, len: usize) -> usize {
    if len == 1 {
        return 0;
    }
    let period = 2 * (len - 1);
    let i = index % period;
    if i < len {
        i
    } else {
        period - i
    }
}

/// Contrast Limited Adaptive Histogram Equalization
///
/// Per-tile clipped histograms give one lookup table per tile; each output
/// pixel blends the tables of its four nearest tile centers bilinearly.
#[derive(Debug, Clone)]
pub struct Clahe {
    clip_limit: f32,
    tiles_x: usize,
    tiles_y: usize,
}

impl Clahe {
    pub fn new(clip_limit: f32, tiles_x: usize, tiles_y: usize) -> SarResult<Self> {
        if tiles_x == 0 || tiles_y == 0 {
            return Err(SarError::ImageLoad(format!(
                "CLAHE tile grid must be non-empty, got {}x{}",
                tiles_x, tiles_y
            )));
        }
        if !clip_limit.is_finite() {
            return Err(SarError::ImageLoad(format!(
                "CLAHE clip limit must be finite, got {}",
                clip_limit
            )));
        }
        Ok(Self { clip_limit, tiles_x, tiles_y })
    }

    pub fn apply(&self, image: &IntensityGrid) -> IntensityGrid {
        let (height, width) = image.dim();
        if height == 0 || width == 0 {
            return image.clone();
        }

        // Pad to a whole number of tiles
        let padded_height = height.div_ceil(self.tiles_y) * self.tiles_y;
        let padded_width = width.div_ceil(self.tiles_x) * self.tiles_x;
        let tile_height = padded_height / self.tiles_y;
        let tile_width = padded_width / self.tiles_x;
        let tile_area = tile_height * tile_width;

        let luts = self.tile_luts(image, tile_width, tile_height, tile_area);

        let inv_tile_width = 1.0 / tile_width as f32;
        let inv_tile_height = 1.0 / tile_height as f32;
        let mut output = Array2::zeros((height, width));

        for y in 0..height {
            let tyf = y as f32 * inv_tile_height - 0.5;
            let ty1_raw = tyf.floor();
            let ya = tyf - ty1_raw;
            let ty1 = (ty1_raw as isize).max(0) as usize;
            let ty2 = ((ty1_raw as isize + 1) as usize).min(self.tiles_y - 1);

            for x in 0..width {
                let txf = x as f32 * inv_tile_width - 0.5;
                let tx1_raw = txf.floor();
                let xa = txf - tx1_raw;
                let tx1 = (tx1_raw as isize).max(0) as usize;
                let tx2 = ((tx1_raw as isize + 1) as usize).min(self.tiles_x - 1);

                let v = image[[y, x]] as usize;
                let lut = |ty: usize, tx: usize| luts[ty * self.tiles_x + tx][v] as f32;

                let top = lut(ty1, tx1) * (1.0 - xa) + lut(ty1, tx2) * xa;
                let bottom = lut(ty2, tx1) * (1.0 - xa) + lut(ty2, tx2) * xa;
                let value = top * (1.0 - ya) + bottom * ya;
                output[[y, x]] = value.round().clamp(0.0, 255.0) as u8;
            }
        }

        output
    }

    fn tile_luts(
        &self,
        image: &IntensityGrid,
        tile_width: usize,
        tile_height: usize,
        tile_area: usize,
    ) -> Vec<[u8; BINS]> {
        let (height, width) = image.dim();
        let clip = if self.clip_limit > 0.0 {
            ((self.clip_limit * tile_area as f32 / BINS as f32) as u32).max(1)
        } else {
            u32::MAX
        };
        let lut_scale = 255.0 / tile_area as f32;

        let mut luts = Vec::with_capacity(self.tiles_x * self.tiles_y);
        for ty in 0..self.tiles_y {
            for tx in 0..self.tiles_x {
                let mut hist = [0u32; BINS];
                for y in ty * tile_height..(ty + 1) * tile_height {
                    let sy = reflect_101(y, height);
                    for x in tx * tile_width..(tx + 1) * tile_width {
                        let sx = reflect_101(x, width);
                        hist[image[[sy, sx]] as usize] += 1;
                    }
                }

                clip_histogram(&mut hist, clip);

                let mut lut = [0u8; BINS];
                let mut sum = 0u32;
                for (bin, count) in hist.iter().enumerate() {
                    sum += count;
                    lut[bin] = (sum as f32 * lut_scale).round().min(255.0) as u8;
                }
                luts.push(lut);
            }
        }

        luts
    }
}

/// Clip bins at `limit` and hand the excess back out evenly,
/// spreading any remainder across bins at a fixed stride.
fn clip_histogram(hist: &mut [u32; BINS], limit: u32) {
    let mut clipped = 0u32;
    for count in hist.iter_mut() {
        if *count > limit {
            clipped += *count - limit;
            *count = limit;
        }
    }
    if clipped == 0 {
        return;
    }

    let batch = clipped / BINS as u32;
    let mut residual = clipped as usize - batch as usize * BINS;
    for count in hist.iter_mut() {
        *count += batch;
    }

    if residual > 0 {
        let step = (BINS / residual).max(1);
        let mut bin = 0;
        while bin < BINS && residual > 0 {
            hist[bin] += 1;
            residual -= 1;
            bin += step;
        }
    }
}

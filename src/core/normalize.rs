use crate::types::{EnhancedImagery, IntensityGrid, ModelTensor, SarError, SarResult};
use ndarray::Array2;

/// Model input edge length
pub const TENSOR_SIZE: usize = 256;

/// Map an 8-bit intensity onto [-1, 1]
#[inline]
pub fn normalize_value(value: f32) -> f32 {
    value / 127.5 - 1.0
}

/// Inverse of [`normalize_value`]
#[inline]
pub fn denormalize_value(value: f32) -> f32 {
    (value + 1.0) * 127.5
}

/// Bilinear resize using pixel-center alignment, edges clamped
pub fn resize_bilinear(image: &IntensityGrid, out_height: usize, out_width: usize) -> SarResult<IntensityGrid> {
    let (height, width) = image.dim();
    if height == 0 || width == 0 {
        return Err(SarError::ImageLoad(format!(
            "cannot resize an empty {}x{} raster",
            width, height
        )));
    }
    if (height, width) == (out_height, out_width) {
        return Ok(image.clone());
    }

    let scale_y = height as f32 / out_height as f32;
    let scale_x = width as f32 / out_width as f32;

    // Column sample positions are shared by every row
    let columns: Vec<(usize, usize, f32)> = (0..out_width)
        .map(|x| source_position(x, scale_x, width))
        .collect();

    let mut resized = Array2::zeros((out_height, out_width));
    for y in 0..out_height {
        let (y0, y1, fy) = source_position(y, scale_y, height);
        for (x, &(x0, x1, fx)) in columns.iter().enumerate() {
            let top = image[[y0, x0]] as f32 * (1.0 - fx) + image[[y0, x1]] as f32 * fx;
            let bottom = image[[y1, x0]] as f32 * (1.0 - fx) + image[[y1, x1]] as f32 * fx;
            let value = top * (1.0 - fy) + bottom * fy;
            resized[[y, x]] = value.round().clamp(0.0, 255.0) as u8;
        }
    }

    Ok(resized)
}

fn source_position(index: usize, scale: f32, len: usize) -> (usize, usize, f32) {
    let src = (index as f32 + 0.5) * scale - 0.5;
    if src <= 0.0 {
        return (0, 0, 0.0);
    }
    let i0 = src.floor() as usize;
    if i0 >= len - 1 {
        return (len - 1, len - 1, 0.0);
    }
    (i0, i0 + 1, src - i0 as f32)
}

/// Turns an enhanced raster into the (1, 1, 256, 256) model tensor
pub struct TensorNormalizer {
    size: usize,
}

impl TensorNormalizer {
    pub fn new() -> Self {
        Self { size: TENSOR_SIZE }
    }

    /// Normalizer for a square tensor of a different edge length
    pub fn with_size(size: usize) -> Self {
        Self { size }
    }

    /// Resize, rescale to [-1, 1] and add batch and channel axes
    pub fn normalize(&self, image: &EnhancedImagery) -> SarResult<ModelTensor> {
        if self.size == 0 {
            return Err(SarError::ImageLoad("tensor size must be positive".to_string()));
        }

        log::debug!(
            "Normalizing {}x{} raster to {}x{} tensor",
            image.width(),
            image.height(),
            self.size,
            self.size
        );

        let resized = resize_bilinear(&image.pixels, self.size, self.size)?;
        let values = resized
            .mapv(|v| normalize_value(v as f32))
            .into_shape((1, 1, self.size, self.size))
            .map_err(|e| SarError::ImageLoad(format!("failed to reshape tensor: {}", e)))?;

        Ok(ModelTensor { values })
    }
}

impl Default for TensorNormalizer {
    fn default() -> Self {
        Self::new()
    }
}

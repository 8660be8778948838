//! PNG input/output through the `image` crate.

use super::{FieldLoader, FieldSaver, MAX_TEMP};
use crate::data::grid::GridBuffer;
use crate::heat_error::HeatSimError;
use image::{Rgb, RgbImage};
use std::path::Path;
use std::str::FromStr;

/// How temperatures are turned into pixels on save.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Palette {
    /// Black to white.
    Gray,
    /// Black, red, yellow, white.
    #[default]
    Heat,
}

impl Palette {
    /// Colour of a normalized value `t` in `[0, 1]`.
    pub fn color(self, t: f64) -> [u8; 3] {
        let t = if t.is_nan() { 0.0 } else { t.clamp(0.0, 1.0) };
        let byte = |v: f64| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
        match self {
            Palette::Gray => [byte(t); 3],
            Palette::Heat => [byte(3.0 * t), byte(3.0 * t - 1.0), byte(3.0 * t - 2.0)],
        }
    }
}

impl FromStr for Palette {
    type Err = HeatSimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "gray" | "grey" => Ok(Palette::Gray),
            "heat" => Ok(Palette::Heat),
            other => Err(HeatSimError::InvalidConfig(format!(
                "unknown palette `{other}` (expected `gray` or `heat`)"
            ))),
        }
    }
}

/// Reads the red channel of a PNG as the heat source; writes the final field
/// as a PNG.
#[derive(Debug, Clone, Copy)]
pub struct PngField {
    /// Temperature mapped to full intensity on save.
    pub max_temp: f64,
    pub palette: Palette,
}

impl Default for PngField {
    fn default() -> Self {
        Self {
            max_temp: MAX_TEMP,
            palette: Palette::default(),
        }
    }
}

impl FieldLoader for PngField {
    fn load(&self, path: &Path) -> Result<GridBuffer, HeatSimError> {
        let img = image::open(path)
            .map_err(|e| HeatSimError::io(path, e))?
            .to_rgb16();
        let (w, h) = img.dimensions();
        let samples = img
            .pixels()
            .map(|p| f64::from(p.0[0]) / f64::from(u16::MAX))
            .collect();
        log::info!("loaded {}x{} heat source from {}", w, h, path.display());
        GridBuffer::from_samples(w as usize, h as usize, samples)
    }
}

impl FieldSaver for PngField {
    fn save(&self, field: &GridBuffer, path: &Path) -> Result<(), HeatSimError> {
        let (w, h) = field.shape();
        let too_big = |_| HeatSimError::InvalidConfig(format!("{w}x{h} field is too large for PNG"));
        let img = RgbImage::from_fn(
            u32::try_from(w).map_err(too_big)?,
            u32::try_from(h).map_err(too_big)?,
            |x, y| Rgb(self.palette.color(field.get(x as usize, y as usize) / self.max_temp)),
        );
        img.save(path).map_err(|e| HeatSimError::io(path, e))?;
        log::info!("saved {}x{} field to {}", w, h, path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn palette_endpoints() {
        assert_eq!(Palette::Heat.color(0.0), [0, 0, 0]);
        assert_eq!(Palette::Heat.color(1.0), [255, 255, 255]);
        assert_eq!(Palette::Heat.color(1.0 / 3.0), [255, 0, 0]);
        assert_eq!(Palette::Gray.color(2.0), [255, 255, 255]);
        assert_eq!(Palette::Gray.color(f64::NAN), [0, 0, 0]);
    }

    #[test]
    fn palette_names() {
        assert_eq!("Grey".parse::<Palette>().unwrap(), Palette::Gray);
        assert_eq!("heat".parse::<Palette>().unwrap(), Palette::Heat);
        assert!("rainbow".parse::<Palette>().is_err());
        assert_eq!(serde_json::to_string(&Palette::Heat).unwrap(), "\"heat\"");
    }

    #[test]
    fn save_then_load_red_channel() {
        let path = std::env::temp_dir().join(format!("halo-heat-png-{}.png", std::process::id()));
        let field = GridBuffer::from_samples(2, 1, vec![0.0, MAX_TEMP]).unwrap();
        let png = PngField {
            palette: Palette::Gray,
            ..PngField::default()
        };
        png.save(&field, &path).unwrap();
        let back = png.load(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(back.shape(), (2, 1));
        assert_eq!(back.row(0), &[0.0, 1.0]);
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = PngField::default()
            .load(Path::new("/nonexistent/heat.png"))
            .unwrap_err();
        assert_eq!(err.kind(), crate::heat_error::ErrorKind::Io);
    }
}

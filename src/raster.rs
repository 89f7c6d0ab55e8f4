/// Point sampling of classified rasters.
///
/// Wells are enriched with the class code of the raster cell that contains
/// them. The GLiM lithology raster is read from a GeoTIFF with the `tiff` crate;
/// georeferencing comes from the ModelPixelScale and ModelTiepoint tags and the
/// nodata value from the GDAL_NODATA tag.

use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::Path;

use tiff::decoder::{Decoder, DecodingResult, Limits};
use tiff::tags::Tag;

const TAG_MODEL_PIXEL_SCALE: u16 = 33550;
const TAG_MODEL_TIEPOINT: u16 = 33922;
const TAG_GDAL_NODATA: u16 = 42113;

#[derive(Debug, thiserror::Error)]
pub enum RasterError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TIFF decode error: {0}")]
    Tiff(#[from] tiff::TiffError),
    #[error("missing georeferencing: {0}")]
    MissingGeoreference(&'static str),
    #[error("unsupported pixel format")]
    UnsupportedPixelFormat,
    #[error("raster holds {actual} cells, expected {rows}x{cols}")]
    SizeMismatch { rows: usize, cols: usize, actual: usize },
}

/// Anything that can answer "which class code is at this coordinate".
pub trait RasterSampler {
    /// Class code at `(x, y)`, or `None` outside the raster or on nodata.
    fn sample(&self, x: f64, y: f64) -> Option<i32>;
}

/// North-up affine georeferencing of a raster.
///
/// ```text
/// x = origin_x + col * pixel_width
/// y = origin_y + row * pixel_height
/// ```
/// `pixel_height` is negative for rasters stored top row first.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoTransform {
    pub origin_x: f64,
    pub origin_y: f64,
    pub pixel_width: f64,
    pub pixel_height: f64,
}

impl GeoTransform {
    pub fn new(origin_x: f64, origin_y: f64, pixel_width: f64, pixel_height: f64) -> Self {
        Self {
            origin_x,
            origin_y,
            pixel_width,
            pixel_height,
        }
    }

    /// Fractional (col, row) of a geographic coordinate.
    pub fn geo_to_pixel(&self, x: f64, y: f64) -> (f64, f64) {
        (
            (x - self.origin_x) / self.pixel_width,
            (y - self.origin_y) / self.pixel_height,
        )
    }

    /// Geographic coordinate of the center of cell (col, row).
    pub fn pixel_center(&self, col: usize, row: usize) -> (f64, f64) {
        (
            self.origin_x + (col as f64 + 0.5) * self.pixel_width,
            self.origin_y + (row as f64 + 0.5) * self.pixel_height,
        )
    }
}

/// An in-memory raster of integer class codes, row-major.
#[derive(Debug, Clone)]
pub struct ClassGrid {
    rows: usize,
    cols: usize,
    data: Vec<i32>,
    transform: GeoTransform,
    nodata: Option<i32>,
}

impl ClassGrid {
    pub fn new(
        rows: usize,
        cols: usize,
        data: Vec<i32>,
        transform: GeoTransform,
        nodata: Option<i32>,
    ) -> Result<Self, RasterError> {
        if data.len() != rows * cols {
            return Err(RasterError::SizeMismatch {
                rows,
                cols,
                actual: data.len(),
            });
        }
        Ok(Self {
            rows,
            cols,
            data,
            transform,
            nodata,
        })
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    pub fn transform(&self) -> &GeoTransform {
        &self.transform
    }

    pub fn nodata(&self) -> Option<i32> {
        self.nodata
    }

    /// Value at (row, col) without the nodata check.
    pub fn get(&self, row: usize, col: usize) -> Option<i32> {
        if row < self.rows && col < self.cols {
            Some(self.data[row * self.cols + col])
        } else {
            None
        }
    }
}

impl RasterSampler for ClassGrid {
    fn sample(&self, x: f64, y: f64) -> Option<i32> {
        if !x.is_finite() || !y.is_finite() {
            return None;
        }
        let (col, row) = self.transform.geo_to_pixel(x, y);
        let (col, row) = (col.floor(), row.floor());
        if col < 0.0 || row < 0.0 {
            return None;
        }
        let value = self.get(row as usize, col as usize)?;
        if Some(value) == self.nodata {
            None
        } else {
            Some(value)
        }
    }
}

/// Reads a single-band classified GeoTIFF.
pub fn read_class_geotiff(path: impl AsRef<Path>) -> Result<ClassGrid, RasterError> {
    let file = File::open(path.as_ref())?;
    decode_class_geotiff(BufReader::new(file))
}

/// Same as `read_class_geotiff`, from any seekable reader.
///
/// The decoder's default buffer limit is lifted: the global GLiM raster is
/// read whole and its decoded buffer is larger than that cap.
pub fn decode_class_geotiff<R: Read + Seek>(reader: R) -> Result<ClassGrid, RasterError> {
    let mut decoder = Decoder::new(reader)?.with_limits(Limits::unlimited());
    let (width, height) = decoder.dimensions()?;
    let (rows, cols) = (height as usize, width as usize);

    let transform = read_geotransform(&mut decoder)?;
    let nodata = read_nodata(&mut decoder);

    // Float rasters truncate toward zero, matching an integer cast of the
    // sampled value.
    let data: Vec<i32> = match decoder.read_image()? {
        DecodingResult::U8(buf) => buf.into_iter().map(i32::from).collect(),
        DecodingResult::U16(buf) => buf.into_iter().map(i32::from).collect(),
        DecodingResult::I8(buf) => buf.into_iter().map(i32::from).collect(),
        DecodingResult::I16(buf) => buf.into_iter().map(i32::from).collect(),
        DecodingResult::I32(buf) => buf,
        DecodingResult::U32(buf) => buf
            .into_iter()
            .map(|v| i32::try_from(v).unwrap_or(i32::MAX))
            .collect(),
        DecodingResult::F32(buf) => buf.into_iter().map(|v| v as i32).collect(),
        DecodingResult::F64(buf) => buf.into_iter().map(|v| v as i32).collect(),
        _ => return Err(RasterError::UnsupportedPixelFormat),
    };

    ClassGrid::new(rows, cols, data, transform, nodata)
}

fn read_geotransform<R: Read + Seek>(decoder: &mut Decoder<R>) -> Result<GeoTransform, RasterError> {
    let scale = decoder
        .get_tag_f64_vec(Tag::from_u16_exhaustive(TAG_MODEL_PIXEL_SCALE))
        .map_err(|_| RasterError::MissingGeoreference("no ModelPixelScale tag"))?;
    let tiepoint = decoder
        .get_tag_f64_vec(Tag::from_u16_exhaustive(TAG_MODEL_TIEPOINT))
        .map_err(|_| RasterError::MissingGeoreference("no ModelTiepoint tag"))?;

    if scale.len() < 2 || tiepoint.len() < 6 {
        return Err(RasterError::MissingGeoreference("short scale or tiepoint tag"));
    }

    // tiepoint: [I, J, K, X, Y, Z], scale: [ScaleX, ScaleY, ScaleZ]
    let origin_x = tiepoint[3] - tiepoint[0] * scale[0];
    let origin_y = tiepoint[4] + tiepoint[1] * scale[1];
    Ok(GeoTransform::new(origin_x, origin_y, scale[0], -scale[1]))
}

fn read_nodata<R: Read + Seek>(decoder: &mut Decoder<R>) -> Option<i32> {
    let text = decoder
        .get_tag_ascii_string(Tag::from_u16_exhaustive(TAG_GDAL_NODATA))
        .ok()?;
    let value: f64 = text.trim_matches(char::from(0)).trim().parse().ok()?;
    Some(value as i32)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 3 rows x 4 cols of 1-degree cells with the top-left corner at (10, 50).
    fn grid() -> ClassGrid {
        let data = vec![
            100, 101, 102, 103, //
            200, 210, 255, 220, //
            500, 600, 700, 800,
        ];
        ClassGrid::new(3, 4, data, GeoTransform::new(10.0, 50.0, 1.0, -1.0), Some(255)).unwrap()
    }

    #[test]
    fn test_sample_cell_interior() {
        assert_eq!(grid().sample(10.5, 49.5), Some(100));
        assert_eq!(grid().sample(13.2, 47.1), Some(800));
    }

    #[test]
    fn test_sample_cell_edges_belong_to_lower_right_cell() {
        // x = 11 is the left edge of column 1; y = 49 is the top edge of row 1.
        assert_eq!(grid().sample(11.0, 49.0), Some(210));
        assert_eq!(grid().sample(10.0, 50.0), Some(100));
    }

    #[test]
    fn test_sample_outside_extent_is_none() {
        let g = grid();
        assert_eq!(g.sample(9.99, 49.5), None);
        assert_eq!(g.sample(14.0, 49.5), None);
        assert_eq!(g.sample(10.5, 50.01), None);
        assert_eq!(g.sample(10.5, 47.0), None);
    }

    #[test]
    fn test_sample_nodata_is_none() {
        assert_eq!(grid().sample(12.5, 48.5), None);
    }

    #[test]
    fn test_sample_non_finite_is_none() {
        assert_eq!(grid().sample(f64::NAN, 49.5), None);
    }

    #[test]
    fn test_pixel_center_round_trips_through_sample() {
        let g = grid();
        let (x, y) = g.transform().pixel_center(2, 1);
        assert_eq!((x, y), (12.5, 48.5));
        let (col, row) = g.transform().geo_to_pixel(x, y);
        assert_eq!((col.floor(), row.floor()), (2.0, 1.0));
    }

    #[test]
    fn test_size_mismatch_is_rejected() {
        let err = ClassGrid::new(2, 2, vec![1, 2, 3], GeoTransform::new(0.0, 0.0, 1.0, -1.0), None);
        assert!(matches!(err, Err(RasterError::SizeMismatch { actual: 3, .. })));
    }

    /// Encodes `grid()` as a 16-bit GeoTIFF with scale, tiepoint and nodata tags.
    fn encoded_grid() -> Vec<u8> {
        use tiff::encoder::{colortype, TiffEncoder};

        let data: Vec<u16> = vec![100, 101, 102, 103, 200, 210, 255, 220, 500, 600, 700, 800];
        let mut bytes = std::io::Cursor::new(Vec::new());
        {
            let mut encoder = TiffEncoder::new(&mut bytes).unwrap();
            let mut image = encoder.new_image::<colortype::Gray16>(4, 3).unwrap();
            image
                .encoder()
                .write_tag(Tag::Unknown(TAG_MODEL_PIXEL_SCALE), &[1.0f64, 1.0, 0.0][..])
                .unwrap();
            image
                .encoder()
                .write_tag(Tag::Unknown(TAG_MODEL_TIEPOINT), &[0.0f64, 0.0, 0.0, 10.0, 50.0, 0.0][..])
                .unwrap();
            image.encoder().write_tag(Tag::Unknown(TAG_GDAL_NODATA), "255").unwrap();
            image.write_data(&data).unwrap();
        }
        bytes.into_inner()
    }

    #[test]
    fn test_decode_geotiff_georeferencing_and_nodata() {
        let decoded = decode_class_geotiff(std::io::Cursor::new(encoded_grid())).unwrap();
        assert_eq!(decoded.shape(), (3, 4));
        assert_eq!(decoded.nodata(), Some(255));
        assert_eq!(*decoded.transform(), GeoTransform::new(10.0, 50.0, 1.0, -1.0));
        assert_eq!(decoded.sample(10.5, 49.5), Some(100));
        assert_eq!(decoded.sample(13.2, 47.1), Some(800));
        assert_eq!(decoded.sample(12.5, 48.5), None);
    }

    #[test]
    fn test_decode_rejects_non_tiff_bytes() {
        let bytes = std::io::Cursor::new(b"definitely not a tiff".to_vec());
        assert!(decode_class_geotiff(bytes).is_err());
    }
}

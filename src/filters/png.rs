use crate::{DecompressError, Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterType {
    None,
    Sub,
    Up,
    Avg,
    Paeth,
}

impl TryFrom<u8> for FilterType {
    type Error = DecompressError;

    fn try_from(n: u8) -> std::result::Result<FilterType, DecompressError> {
        match n {
            0 => Ok(FilterType::None),
            1 => Ok(FilterType::Sub),
            2 => Ok(FilterType::Up),
            3 => Ok(FilterType::Avg),
            4 => Ok(FilterType::Paeth),
            _ => Err(DecompressError::Predictor(format!("invalid PNG filter type ({})", n))),
        }
    }
}

/// Geometry of one predicted row, from the `/DecodeParms` of a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowLayout {
    /// Distance to the corresponding byte of the previous pixel, at least 1.
    pub bytes_per_pixel: usize,
    pub bytes_per_row: usize,
}

impl RowLayout {
    pub fn new(colors: i64, bits_per_component: i64, columns: i64) -> Result<RowLayout> {
        let invalid = || DecompressError::Predictor(format!("invalid row layout {colors}x{bits_per_component}x{columns}"));
        let colors = u64::try_from(colors).map_err(|_| invalid())?;
        let bits = u64::try_from(bits_per_component).map_err(|_| invalid())?;
        let columns = u64::try_from(columns).map_err(|_| invalid())?;
        if colors == 0 || columns == 0 || !matches!(bits, 1 | 2 | 4 | 8 | 16) {
            return Err(invalid().into());
        }

        let bits_per_pixel = colors.checked_mul(bits).ok_or_else(invalid)?;
        let bits_per_row = bits_per_pixel.checked_mul(columns).ok_or_else(invalid)?;
        let bytes_per_row = usize::try_from(bits_per_row.div_ceil(8)).map_err(|_| invalid())?;
        let bytes_per_pixel = usize::try_from(bits_per_pixel.div_ceil(8)).map_err(|_| invalid())?;
        Ok(RowLayout {
            bytes_per_pixel,
            bytes_per_row,
        })
    }
}

fn paeth_predict(left: u8, above: u8, upperleft: u8) -> u8 {
    let (a, b, c) = (i16::from(left), i16::from(above), i16::from(upperleft));
    let p = a + b - c;
    let (pa, pb, pc) = ((p - a).abs(), (p - b).abs(), (p - c).abs());

    if pa <= pb && pa <= pc {
        left
    } else if pb <= pc {
        above
    } else {
        upperleft
    }
}

pub fn decode_row(filter: FilterType, bpp: usize, previous: &[u8], current: &mut [u8]) {
    let len = current.len();
    let bpp = bpp.min(len);

    match filter {
        FilterType::None => (),
        FilterType::Sub => {
            for i in bpp..len {
                current[i] = current[i].wrapping_add(current[i - bpp]);
            }
        }
        FilterType::Up => {
            for (byte, above) in current.iter_mut().zip(previous) {
                *byte = byte.wrapping_add(*above);
            }
        }
        FilterType::Avg => {
            for i in 0..len {
                let left = if i >= bpp { u16::from(current[i - bpp]) } else { 0 };
                current[i] = current[i].wrapping_add(((left + u16::from(previous[i])) / 2) as u8);
            }
        }
        FilterType::Paeth => {
            for i in 0..len {
                let (left, upperleft) = if i >= bpp {
                    (current[i - bpp], previous[i - bpp])
                } else {
                    (0, 0)
                };
                current[i] = current[i].wrapping_add(paeth_predict(left, previous[i], upperleft));
            }
        }
    }
}

/// Undo PNG prediction; every row carries its own filter type byte.
pub fn decode_frame(content: &[u8], layout: RowLayout) -> Result<Vec<u8>> {
    let stride = layout.bytes_per_row + 1;
    let rows = content.len() / stride;
    let requested = rows * layout.bytes_per_row;

    let mut decoded = Vec::new();
    decoded
        .try_reserve_exact(requested)
        .map_err(|_| Error::OutOfMemory { requested })?;
    let mut previous = vec![0_u8; layout.bytes_per_row];

    for row in content.chunks(stride) {
        if row.len() != stride {
            return Err(DecompressError::Predictor(format!(
                "truncated row of {} bytes, expected {}",
                row.len(),
                stride
            ))
            .into());
        }
        let filter = FilterType::try_from(row[0])?;
        let mut current = row[1..].to_vec();
        decode_row(filter, layout.bytes_per_pixel, &previous, &mut current);
        decoded.extend_from_slice(&current);
        previous = current;
    }
    Ok(decoded)
}

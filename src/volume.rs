use thiserror::Error;

/// The eight NIfTI-1 sample representations this viewer can display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Datatype {
    Uint8,
    Int16,
    Int32,
    Float32,
    Float64,
    Int8,
    Uint16,
    Uint32,
}

#[derive(Debug, Error)]
#[error("unsupported datatype code {0}")]
pub struct UnsupportedDatatype(pub i16);

impl Datatype {
    pub fn from_code(code: i16) -> Option<Self> {
        match code {
            2 => Some(Self::Uint8),
            4 => Some(Self::Int16),
            8 => Some(Self::Int32),
            16 => Some(Self::Float32),
            64 => Some(Self::Float64),
            256 => Some(Self::Int8),
            512 => Some(Self::Uint16),
            768 => Some(Self::Uint32),
            _ => None,
        }
    }

    /// Size of one sample in bytes.
    pub fn element_size(self) -> usize {
        match self {
            Self::Uint8 | Self::Int8 => 1,
            Self::Int16 | Self::Uint16 => 2,
            Self::Int32 | Self::Uint32 | Self::Float32 => 4,
            Self::Float64 => 8,
        }
    }
}

/// Header fields the viewer needs, in NIfTI order: `dims[0]` is the
/// dimensionality, `dims[1]` columns, `dims[2]` rows, `dims[3]` slices,
/// `dims[4]` the optional volume count.
#[derive(Debug, Clone)]
pub struct VolumeHeader {
    pub dims: [u16; 8],
    pub datatype_code: i16,
}

impl VolumeHeader {
    pub fn cols(&self) -> usize {
        self.dims[1] as usize
    }

    pub fn rows(&self) -> usize {
        self.dims[2] as usize
    }

    pub fn slices(&self) -> usize {
        self.dims[3] as usize
    }

    /// Slider position right after a load: the middle slice, rounding up on
    /// odd counts and clamped so a single-slice volume stays in range.
    pub fn middle_slice(&self) -> usize {
        let slices = self.slices();
        slices.div_ceil(2).min(slices.saturating_sub(1))
    }
}

/// A decoded volume: header plus the flat sample buffer in native byte
/// order, row-major within a slice, slices concatenated. Never mutated
/// after decode.
#[derive(Debug)]
pub struct Volume {
    pub header: VolumeHeader,
    data: Vec<u8>,
}

impl Volume {
    pub fn new(header: VolumeHeader, data: Vec<u8>) -> Self {
        Self { header, data }
    }

    /// Typed view over the sample buffer. Fails when the header carries a
    /// datatype code outside the eight displayable ones; callers skip the
    /// draw entirely in that case.
    pub fn voxels(&self) -> Result<VoxelReader<'_>, UnsupportedDatatype> {
        let datatype = Datatype::from_code(self.header.datatype_code)
            .ok_or(UnsupportedDatatype(self.header.datatype_code))?;
        Ok(VoxelReader {
            data: &self.data,
            datatype,
        })
    }

    /// Grid over one slice. The index is not bounds-checked here; callers
    /// keep it inside `[0, slices - 1]` (the slider range does).
    pub fn slice(&self, index: usize) -> Result<SliceGrid<'_>, UnsupportedDatatype> {
        let cols = self.header.cols();
        let slice_size = cols * self.header.rows();
        Ok(SliceGrid {
            voxels: self.voxels()?,
            offset: slice_size * index,
            cols,
        })
    }
}

/// Reads single samples out of the flat buffer, dispatching on the datatype
/// for width and signedness. Pure reads, no side effects.
pub struct VoxelReader<'a> {
    data: &'a [u8],
    datatype: Datatype,
}

impl VoxelReader<'_> {
    pub fn read(&self, offset: usize) -> f64 {
        let start = offset * self.datatype.element_size();
        let b = &self.data[start..start + self.datatype.element_size()];
        match self.datatype {
            Datatype::Uint8 => b[0] as f64,
            Datatype::Int8 => b[0] as i8 as f64,
            Datatype::Int16 => i16::from_ne_bytes([b[0], b[1]]) as f64,
            Datatype::Uint16 => u16::from_ne_bytes([b[0], b[1]]) as f64,
            Datatype::Int32 => i32::from_ne_bytes([b[0], b[1], b[2], b[3]]) as f64,
            Datatype::Uint32 => u32::from_ne_bytes([b[0], b[1], b[2], b[3]]) as f64,
            Datatype::Float32 => f32::from_ne_bytes([b[0], b[1], b[2], b[3]]) as f64,
            Datatype::Float64 => {
                f64::from_ne_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]])
            }
        }
    }
}

/// Row-major view over a single slice.
pub struct SliceGrid<'a> {
    voxels: VoxelReader<'a>,
    offset: usize,
    cols: usize,
}

impl SliceGrid<'_> {
    pub fn value_at(&self, row: usize, col: usize) -> f64 {
        self.voxels.read(self.offset + row * self.cols + col)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_volume(dims3: [u16; 3], datatype_code: i16, data: Vec<u8>) -> Volume {
        let mut dims = [0u16; 8];
        dims[0] = 3;
        dims[1..4].copy_from_slice(&dims3);
        Volume::new(
            VolumeHeader {
                dims,
                datatype_code,
            },
            data,
        )
    }

    #[test]
    fn the_eight_datatype_codes_resolve() {
        let codes = [
            (2, Datatype::Uint8),
            (4, Datatype::Int16),
            (8, Datatype::Int32),
            (16, Datatype::Float32),
            (64, Datatype::Float64),
            (256, Datatype::Int8),
            (512, Datatype::Uint16),
            (768, Datatype::Uint32),
        ];
        for (code, expected) in codes {
            assert_eq!(Datatype::from_code(code), Some(expected));
        }
    }

    #[test]
    fn unknown_datatype_codes_are_rejected() {
        // 128 is RGB24, which has no grayscale interpretation here
        for code in [0, 1, 128, 1024, -3] {
            assert_eq!(Datatype::from_code(code), None);
        }
        let volume = make_volume([2, 2, 1], 128, vec![0; 12]);
        assert!(volume.voxels().is_err());
        assert!(volume.slice(0).is_err());
    }

    #[test]
    fn reads_respect_width_and_signedness() {
        let samples = [-2i16, 0, 513, i16::MIN];
        let data: Vec<u8> = samples.iter().flat_map(|v| v.to_ne_bytes()).collect();
        let volume = make_volume([4, 1, 1], 4, data);
        let voxels = volume.voxels().unwrap();
        for (offset, sample) in samples.iter().enumerate() {
            assert_eq!(voxels.read(offset), *sample as f64);
        }
    }

    #[test]
    fn float_samples_read_back_exactly() {
        let samples = [0.5f32, -123.25, 0.0];
        let data: Vec<u8> = samples.iter().flat_map(|v| v.to_ne_bytes()).collect();
        let volume = make_volume([3, 1, 1], 16, data);
        let voxels = volume.voxels().unwrap();
        for (offset, sample) in samples.iter().enumerate() {
            assert_eq!(voxels.read(offset), *sample as f64);
        }

        let data: Vec<u8> = (-2.5f64).to_ne_bytes().to_vec();
        let volume = make_volume([1, 1, 1], 64, data);
        assert_eq!(volume.voxels().unwrap().read(0), -2.5);
    }

    #[test]
    fn slice_values_match_direct_flat_reads() {
        let (cols, rows, slices) = (3usize, 2usize, 4usize);
        let data: Vec<u8> = (0..(cols * rows * slices) as u8).collect();
        let volume = make_volume([cols as u16, rows as u16, slices as u16], 2, data);
        let voxels = volume.voxels().unwrap();
        let slice_size = cols * rows;

        for index in 0..slices {
            let grid = volume.slice(index).unwrap();
            for row in 0..rows {
                for col in 0..cols {
                    assert_eq!(
                        grid.value_at(row, col),
                        voxels.read(slice_size * index + row * cols + col),
                    );
                }
            }
        }
    }

    #[test]
    fn middle_slice_matches_the_slider_reset() {
        let header = |slices: u16| {
            let mut dims = [0u16; 8];
            dims[0] = 3;
            dims[1] = 4;
            dims[2] = 4;
            dims[3] = slices;
            VolumeHeader {
                dims,
                datatype_code: 2,
            }
        };
        assert_eq!(header(10).middle_slice(), 5);
        assert_eq!(header(9).middle_slice(), 5);
        assert_eq!(header(2).middle_slice(), 1);
        // a single slice must still be a valid index
        assert_eq!(header(1).middle_slice(), 0);
    }
}

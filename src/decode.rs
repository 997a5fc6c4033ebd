//! Adapter over the NIfTI decoder. The viewer treats parsing as a black box:
//! bytes go in, a header plus a flat native-endian sample buffer comes out.

use std::io::{self, Read};

use flate2::read::GzDecoder;
use log::debug;
use nifti::{InMemNiftiObject, NiftiObject};
use thiserror::Error;

use crate::volume::{Datatype, Volume, VolumeHeader};

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("not a NIfTI-1 file")]
    NotNifti,

    #[error("NIfTI error: {0}")]
    Nifti(#[from] nifti::error::NiftiError),
}

/// Gzip magic sniff; `.nii.gz` files start with `1f 8b`.
pub fn is_compressed(bytes: &[u8]) -> bool {
    bytes.len() >= 2 && bytes[0] == 0x1f && bytes[1] == 0x8b
}

pub fn decompress(bytes: &[u8]) -> io::Result<Vec<u8>> {
    let mut out = Vec::new();
    GzDecoder::new(bytes).read_to_end(&mut out)?;
    Ok(out)
}

/// NIfTI-1 magic at offset 344: `n+1\0` (single file) or `ni1\0` (header of
/// a .hdr/.img pair).
pub fn is_nifti(bytes: &[u8]) -> bool {
    let Some(magic) = bytes.get(344..348) else {
        return false;
    };
    magic == b"n+1\0" || magic == b"ni1\0"
}

/// Read header and image in one pass through the collaborator and package
/// them as a displayable volume. Multi-byte samples from files in foreign
/// byte order are normalized to native order so the voxel reader never has
/// to care.
pub fn read_volume(bytes: &[u8]) -> Result<Volume, DecodeError> {
    if !is_nifti(bytes) {
        return Err(DecodeError::NotNifti);
    }

    let object = InMemNiftiObject::from_reader(bytes)?;
    let header = VolumeHeader {
        dims: object.header().dim,
        datatype_code: object.header().datatype,
    };
    let mut data = object.into_volume().into_raw_data();

    if needs_swap(bytes)
        && let Some(datatype) = Datatype::from_code(header.datatype_code)
    {
        swap_elements(&mut data, datatype.element_size());
    }

    debug!(
        "decoded volume: dims {:?}, datatype code {}, {} bytes",
        &header.dims[..],
        header.datatype_code,
        data.len()
    );
    Ok(Volume::new(header, data))
}

// A NIfTI-1 header always starts with sizeof_hdr = 348; the byte order it is
// stored in tells us whether the file matches the native order.
fn needs_swap(bytes: &[u8]) -> bool {
    let Some(word) = bytes.get(0..4) else {
        return false;
    };
    i32::from_ne_bytes([word[0], word[1], word[2], word[3]]) != 348
}

// Reverse the bytes of every sample in place.
fn swap_elements(data: &mut [u8], element_size: usize) {
    if element_size > 1 {
        for element in data.chunks_exact_mut(element_size) {
            element.reverse();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::{Compression, write::GzEncoder};
    use std::io::Write;

    // Minimal single-file NIfTI-1: 348-byte header, 4-byte extender, payload.
    fn build_nifti(dims: [u16; 3], datatype_code: i16, bitpix: i16, payload: &[u8]) -> Vec<u8> {
        let mut bytes = vec![0u8; 352];
        bytes[0..4].copy_from_slice(&348i32.to_le_bytes());
        let dim: [u16; 8] = [3, dims[0], dims[1], dims[2], 1, 1, 1, 1];
        for (i, d) in dim.iter().enumerate() {
            bytes[40 + i * 2..42 + i * 2].copy_from_slice(&d.to_le_bytes());
        }
        bytes[70..72].copy_from_slice(&datatype_code.to_le_bytes());
        bytes[72..74].copy_from_slice(&bitpix.to_le_bytes());
        for i in 0..8 {
            bytes[76 + i * 4..80 + i * 4].copy_from_slice(&1.0f32.to_le_bytes());
        }
        bytes[108..112].copy_from_slice(&352.0f32.to_le_bytes());
        bytes[344..348].copy_from_slice(b"n+1\0");
        bytes.extend_from_slice(payload);
        bytes
    }

    #[test]
    fn the_nifti_magic_gates_input() {
        let bytes = build_nifti([2, 2, 2], 2, 8, &[0; 8]);
        assert!(is_nifti(&bytes));
        assert!(!is_nifti(&[0u8; 400]));
        assert!(!is_nifti(b"short"));
    }

    #[test]
    fn non_nifti_bytes_are_rejected() {
        assert!(matches!(read_volume(&[0u8; 400]), Err(DecodeError::NotNifti)));
    }

    #[test]
    fn read_volume_recovers_header_and_payload() {
        let payload: Vec<u8> = (0..8).collect();
        let bytes = build_nifti([2, 2, 2], 2, 8, &payload);
        let volume = read_volume(&bytes).unwrap();

        assert_eq!(volume.header.cols(), 2);
        assert_eq!(volume.header.rows(), 2);
        assert_eq!(volume.header.slices(), 2);
        assert_eq!(volume.header.datatype_code, 2);
        let voxels = volume.voxels().unwrap();
        for offset in 0..payload.len() {
            assert_eq!(voxels.read(offset), offset as f64);
        }
    }

    #[test]
    fn compressed_input_decompresses_to_the_same_bytes() {
        let bytes = build_nifti([2, 2, 2], 2, 8, &(0..8).collect::<Vec<u8>>());
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&bytes).unwrap();
        let gz = encoder.finish().unwrap();

        assert!(is_compressed(&gz));
        assert!(!is_compressed(&bytes));
        assert_eq!(decompress(&gz).unwrap(), bytes);
    }

    #[test]
    fn element_swap_reverses_sample_bytes() {
        let mut data = vec![0x01, 0x02, 0x03, 0x04];
        swap_elements(&mut data, 2);
        assert_eq!(data, vec![0x02, 0x01, 0x04, 0x03]);

        // single-byte samples have nothing to swap
        let mut data = vec![0xaa, 0xbb];
        swap_elements(&mut data, 1);
        assert_eq!(data, vec![0xaa, 0xbb]);
    }

    #[test]
    fn needs_swap_follows_the_stored_byte_order() {
        let native = 348i32.to_ne_bytes();
        let mut swapped = native;
        swapped.reverse();
        assert!(!needs_swap(&native));
        assert!(needs_swap(&swapped));
    }
}

use crate::error::{PipelineError, Result};
use bytes::Bytes;
use img_parts::{DynImage, ImageEXIF, ImageICC};

/// Copies the EXIF block and ICC profile of `source` into `encoded`.
///
/// Containers img-parts cannot edit (GIF, TIFF, BMP, AVIF) are returned
/// untouched, as is output whose source carried no metadata.
pub fn copy_metadata(source: &[u8], encoded: Vec<u8>) -> Result<Vec<u8>> {
    let source = match DynImage::from_bytes(Bytes::copy_from_slice(source)) {
        Ok(Some(image)) => image,
        Ok(None) | Err(_) => {
            log::debug!("input container carries no editable metadata");
            return Ok(encoded);
        }
    };
    let exif = source.exif();
    let icc = source.icc_profile();
    if exif.is_none() && icc.is_none() {
        return Ok(encoded);
    }

    let encoded = Bytes::from(encoded);
    let mut output = match DynImage::from_bytes(encoded.clone()) {
        Ok(Some(image)) => image,
        Ok(None) => {
            log::warn!("output format cannot carry EXIF/ICC metadata; writing without it");
            return Ok(encoded.to_vec());
        }
        Err(e) => return Err(PipelineError::Metadata(e.to_string())),
    };

    if exif.is_some() {
        output.set_exif(exif);
    }
    if icc.is_some() {
        output.set_icc_profile(icc);
    }

    let mut buf = Vec::with_capacity(encoded.len());
    output.encoder().write_to(&mut buf)?;
    Ok(buf)
}

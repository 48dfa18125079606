use std::io::Cursor;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::{DynamicImage, ImageFormat, Luma};
use qrcode::{EcLevel, QrCode};
use thiserror::Error;

use crate::models::CredentialPayload;
use crate::services::signing::HmacKey;
use crate::utils::error::AppError;

const QR_MIN_DIMENSION: u32 = 320;

/// Signs credentials and checks signatures on scanned ones.
///
/// Without a secret, credentials are issued unsigned and any `sig` on a
/// scanned payload is ignored.
#[derive(Debug, Clone)]
pub struct CredentialSigner {
    key: Option<HmacKey>,
}

impl CredentialSigner {
    pub fn new(secret: Option<&str>) -> Self {
        Self {
            key: secret.and_then(HmacKey::new),
        }
    }

    pub fn is_enforcing(&self) -> bool {
        self.key.is_some()
    }

    pub fn sign(&self, payload: &mut CredentialPayload) {
        payload.sig = self
            .key
            .as_ref()
            .map(|key| key.sign_hex(&payload.signing_message()));
    }

    pub fn check(&self, payload: &CredentialPayload) -> Result<(), AppError> {
        let Some(key) = self.key.as_ref() else {
            return Ok(());
        };
        match payload.sig.as_deref() {
            Some(sig) if key.verify_hex(&payload.signing_message(), sig) => Ok(()),
            Some(_) => Err(AppError::MalformedCredential(
                "credential signature is invalid".to_string(),
            )),
            None => Err(AppError::MalformedCredential(
                "credential is not signed".to_string(),
            )),
        }
    }
}

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("could not encode credential: {0}")]
    Encode(String),

    #[error("could not read image: {0}")]
    Image(#[from] image::ImageError),
}

impl From<CodecError> for AppError {
    fn from(err: CodecError) -> Self {
        match err {
            CodecError::Image(e) => AppError::ValidationError(format!("Unreadable image: {e}")),
            CodecError::Encode(msg) => AppError::InternalServerError(msg),
        }
    }
}

/// Turns credential text into a scannable image and back.
pub trait CredentialCodec: Send + Sync {
    /// PNG bytes.
    fn encode(&self, payload: &str) -> Result<Vec<u8>, CodecError>;

    /// `Ok(None)` when the image holds no readable code.
    fn decode(&self, image: &[u8]) -> Result<Option<String>, CodecError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct QrCodec;

impl CredentialCodec for QrCodec {
    fn encode(&self, payload: &str) -> Result<Vec<u8>, CodecError> {
        let code = QrCode::with_error_correction_level(payload.as_bytes(), EcLevel::M)
            .map_err(|e| CodecError::Encode(e.to_string()))?;
        let rendered = code
            .render::<Luma<u8>>()
            .min_dimensions(QR_MIN_DIMENSION, QR_MIN_DIMENSION)
            .build();

        let mut png = Vec::new();
        DynamicImage::ImageLuma8(rendered)
            .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
            .map_err(|e| CodecError::Encode(e.to_string()))?;
        Ok(png)
    }

    fn decode(&self, image: &[u8]) -> Result<Option<String>, CodecError> {
        let luma = image::load_from_memory(image)?.to_luma8();
        let (width, height) = luma.dimensions();
        let mut prepared =
            rqrr::PreparedImage::prepare_from_greyscale(width as usize, height as usize, |x, y| {
                luma.get_pixel(x as u32, y as u32).0[0]
            });

        for grid in prepared.detect_grids() {
            match grid.decode() {
                Ok((_, content)) => return Ok(Some(content)),
                Err(e) => tracing::debug!(error = %e, "Skipping undecodable grid"),
            }
        }
        Ok(None)
    }
}

pub fn png_data_url(png: &[u8]) -> String {
    format!("data:image/png;base64,{}", STANDARD.encode(png))
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use uuid::Uuid;

    use super::*;

    fn payload() -> CredentialPayload {
        CredentialPayload {
            ticket_id: Uuid::new_v4(),
            gateway_order_id: "order_Q1".into(),
            gateway_payment_id: "pay_Q1".into(),
            amount: 90000,
            currency: "INR".into(),
            tier: Some("Couple".into()),
            quantity: Some(1),
            issued_at: Some(Utc::now()),
            sig: None,
        }
    }

    #[test]
    fn test_qr_round_trip_is_byte_exact() {
        let signer = CredentialSigner::new(Some("credential-secret"));
        let mut credential = payload();
        signer.sign(&mut credential);
        let text = credential.encode().unwrap();

        let png = QrCodec.encode(&text).unwrap();
        let decoded = QrCodec.decode(&png).unwrap();

        assert_eq!(decoded.as_deref(), Some(text.as_str()));
    }

    #[test]
    fn test_decode_image_without_code() {
        let blank = image::GrayImage::from_pixel(64, 64, Luma([255u8]));
        let mut png = Vec::new();
        DynamicImage::ImageLuma8(blank)
            .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
            .unwrap();

        assert_eq!(QrCodec.decode(&png).unwrap(), None);
    }

    #[test]
    fn test_decode_rejects_non_images() {
        assert!(matches!(
            QrCodec.decode(b"definitely not a png"),
            Err(CodecError::Image(_))
        ));
    }

    #[test]
    fn test_signer_detects_tampering() {
        let signer = CredentialSigner::new(Some("credential-secret"));
        let mut credential = payload();
        signer.sign(&mut credential);
        assert!(signer.check(&credential).is_ok());

        let mut forged = credential.clone();
        forged.gateway_payment_id = "pay_other".into();
        assert!(matches!(
            signer.check(&forged),
            Err(AppError::MalformedCredential(_))
        ));

        let mut unsigned = credential;
        unsigned.sig = None;
        assert!(signer.check(&unsigned).is_err());
    }

    #[test]
    fn test_signer_without_secret_accepts_anything() {
        let signer = CredentialSigner::new(None);
        let mut credential = payload();
        signer.sign(&mut credential);
        assert!(credential.sig.is_none());
        assert!(!signer.is_enforcing());

        credential.sig = Some("garbage".into());
        assert!(signer.check(&credential).is_ok());
    }

    #[test]
    fn test_data_url_prefix() {
        assert!(png_data_url(&[1, 2, 3]).starts_with("data:image/png;base64,AQID"));
    }
}

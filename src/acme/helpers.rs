use crate::acme::error::AcmeError;

pub fn b64(data: &[u8]) -> String {
    base64::encode_config(data, base64::URL_SAFE_NO_PAD)
}

pub fn b64_decode(data: &str) -> Result<Vec<u8>, AcmeError> {
    base64::decode_config(data, base64::URL_SAFE_NO_PAD).map_err(AcmeError::Base64Decode)
}

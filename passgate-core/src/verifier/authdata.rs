//! Authenticator data parsing (WebAuthn §6.1).

use std::io::Cursor;

use ciborium::Value;

use crate::error::VerificationError;

pub const FLAG_USER_PRESENT: u8 = 0x01;
pub const FLAG_USER_VERIFIED: u8 = 0x04;
pub const FLAG_ATTESTED_CREDENTIAL: u8 = 0x40;
pub const FLAG_EXTENSIONS: u8 = 0x80;

const HEADER_LEN: usize = 37;
const AAGUID_LEN: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttestedCredentialData {
    pub aaguid: [u8; AAGUID_LEN],
    pub credential_id: Vec<u8>,
    /// The COSE_Key exactly as encoded by the authenticator.
    pub public_key: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatorData {
    pub rp_id_hash: [u8; 32],
    pub flags: u8,
    pub counter: u32,
    pub attested: Option<AttestedCredentialData>,
}

impl AuthenticatorData {
    pub fn parse(bytes: &[u8]) -> Result<Self, VerificationError> {
        if bytes.len() < HEADER_LEN {
            return Err(VerificationError::new("authenticator data too short"));
        }

        let mut rp_id_hash = [0u8; 32];
        rp_id_hash.copy_from_slice(&bytes[..32]);
        let flags = bytes[32];
        let counter = u32::from_be_bytes([bytes[33], bytes[34], bytes[35], bytes[36]]);

        let mut offset = HEADER_LEN;
        let attested = if flags & FLAG_ATTESTED_CREDENTIAL != 0 {
            let (data, consumed) = parse_attested(&bytes[offset..])?;
            offset += consumed;
            Some(data)
        } else {
            None
        };

        if flags & FLAG_EXTENSIONS != 0 {
            let mut cursor = Cursor::new(&bytes[offset..]);
            let _: Value = ciborium::from_reader(&mut cursor)
                .map_err(|e| VerificationError::new(format!("malformed extensions: {e}")))?;
            offset += cursor.position() as usize;
        }

        if offset != bytes.len() {
            return Err(VerificationError::new("trailing bytes after authenticator data"));
        }

        Ok(Self {
            rp_id_hash,
            flags,
            counter,
            attested,
        })
    }

    pub fn user_present(&self) -> bool {
        self.flags & FLAG_USER_PRESENT != 0
    }

    pub fn user_verified(&self) -> bool {
        self.flags & FLAG_USER_VERIFIED != 0
    }
}

fn parse_attested(bytes: &[u8]) -> Result<(AttestedCredentialData, usize), VerificationError> {
    if bytes.len() < AAGUID_LEN + 2 {
        return Err(VerificationError::new(
            "authenticator data too short for attested credential data",
        ));
    }

    let mut aaguid = [0u8; AAGUID_LEN];
    aaguid.copy_from_slice(&bytes[..AAGUID_LEN]);
    let id_len = u16::from_be_bytes([bytes[AAGUID_LEN], bytes[AAGUID_LEN + 1]]) as usize;
    let id_start = AAGUID_LEN + 2;
    let key_start = id_start + id_len;
    if bytes.len() < key_start {
        return Err(VerificationError::new(
            "authenticator data too short for credential id",
        ));
    }

    // The COSE key is not length-prefixed; decode it to find where it ends
    let mut cursor = Cursor::new(&bytes[key_start..]);
    let _: Value = ciborium::from_reader(&mut cursor)
        .map_err(|e| VerificationError::new(format!("malformed credential public key: {e}")))?;
    let key_end = key_start + cursor.position() as usize;

    Ok((
        AttestedCredentialData {
            aaguid,
            credential_id: bytes[id_start..key_start].to_vec(),
            public_key: bytes[key_start..key_end].to_vec(),
        },
        key_end,
    ))
}

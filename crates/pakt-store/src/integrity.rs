use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use sha1::Sha1;
use sha2::{Digest, Sha256, Sha384, Sha512};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum HashAlgorithm {
    Sha1,
    Sha256,
    Sha384,
    Sha512,
}

impl HashAlgorithm {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sha1 => "sha1",
            Self::Sha256 => "sha256",
            Self::Sha384 => "sha384",
            Self::Sha512 => "sha512",
        }
    }

    fn digest(self, bytes: &[u8]) -> Vec<u8> {
        match self {
            Self::Sha1 => Sha1::digest(bytes).to_vec(),
            Self::Sha256 => Sha256::digest(bytes).to_vec(),
            Self::Sha384 => Sha384::digest(bytes).to_vec(),
            Self::Sha512 => Sha512::digest(bytes).to_vec(),
        }
    }
}

impl FromStr for HashAlgorithm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sha1" => Ok(Self::Sha1),
            "sha256" => Ok(Self::Sha256),
            "sha384" => Ok(Self::Sha384),
            "sha512" => Ok(Self::Sha512),
            other => Err(format!("unsupported hash algorithm '{other}'")),
        }
    }
}

/// A subresource-integrity value such as `sha512-<base64>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Integrity {
    algorithm: HashAlgorithm,
    digest: Vec<u8>,
}

impl Integrity {
    #[must_use]
    pub fn compute(algorithm: HashAlgorithm, bytes: &[u8]) -> Self {
        Self {
            algorithm,
            digest: algorithm.digest(bytes),
        }
    }

    #[must_use]
    pub fn sha512(bytes: &[u8]) -> Self {
        Self::compute(HashAlgorithm::Sha512, bytes)
    }

    /// Builds an integrity from a hex digest, as in the legacy `shasum` field.
    #[must_use]
    pub fn from_hex(algorithm: HashAlgorithm, hex: &str) -> Option<Self> {
        if hex.len() % 2 != 0 {
            return None;
        }
        let digest = (0..hex.len())
            .step_by(2)
            .map(|i| hex.get(i..i + 2).and_then(|b| u8::from_str_radix(b, 16).ok()))
            .collect::<Option<Vec<u8>>>()?;
        Some(Self { algorithm, digest })
    }

    #[must_use]
    pub const fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }

    /// Lowercase hex digest, used to lay out store paths.
    #[must_use]
    pub fn hex_digest(&self) -> String {
        self.digest.iter().map(|b| format!("{b:02x}")).collect()
    }

    /// Hashes `bytes` with this value's algorithm; on mismatch returns what was computed.
    pub fn check(&self, bytes: &[u8]) -> Result<(), Self> {
        let actual = Self::compute(self.algorithm, bytes);
        if actual.digest == self.digest {
            Ok(())
        } else {
            Err(actual)
        }
    }
}

impl fmt::Display for Integrity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.algorithm.as_str(), STANDARD.encode(&self.digest))
    }
}

impl FromStr for Integrity {
    type Err = String;

    /// Accepts whitespace-separated SRI lists and keeps the strongest supported hash.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut best: Option<Self> = None;
        let mut last_error = format!("empty integrity '{s}'");

        for token in s.split_whitespace() {
            let token = token.split('?').next().unwrap_or(token);
            let Some((algo, encoded)) = token.split_once('-') else {
                last_error = format!("malformed integrity '{token}'");
                continue;
            };
            let algorithm = match algo.parse::<HashAlgorithm>() {
                Ok(a) => a,
                Err(e) => {
                    last_error = e;
                    continue;
                }
            };
            let digest = match STANDARD.decode(encoded) {
                Ok(d) => d,
                Err(e) => {
                    last_error = format!("invalid base64 in integrity '{token}': {e}");
                    continue;
                }
            };
            if best.as_ref().is_none_or(|b| algorithm > b.algorithm) {
                best = Some(Self { algorithm, digest });
            }
        }

        best.ok_or(last_error)
    }
}

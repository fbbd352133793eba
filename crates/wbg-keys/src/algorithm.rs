use std::fmt;
use std::str::FromStr;

/// Signature scheme selector passed to the guest's key-pair constructor.
/// The discriminants are the guest's enum values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SignatureAlgorithm {
    #[default]
    Ed25519 = 0,
    Secp256r1 = 1,
}

impl SignatureAlgorithm {
    pub const ALL: [SignatureAlgorithm; 2] =
        [SignatureAlgorithm::Ed25519, SignatureAlgorithm::Secp256r1];

    pub fn as_str(self) -> &'static str {
        match self {
            SignatureAlgorithm::Ed25519 => "ed25519",
            SignatureAlgorithm::Secp256r1 => "secp256r1",
        }
    }

    pub fn selector(self) -> u32 {
        self as u32
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ed25519" => Some(SignatureAlgorithm::Ed25519),
            "secp256r1" | "p256" => Some(SignatureAlgorithm::Secp256r1),
            _ => None,
        }
    }
}

impl fmt::Display for SignatureAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct SignatureAlgorithmParseError {
    value: String,
}

impl fmt::Display for SignatureAlgorithmParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unknown signature algorithm {:?} (expected one of: ed25519, secp256r1)",
            self.value
        )
    }
}

impl std::error::Error for SignatureAlgorithmParseError {}

impl FromStr for SignatureAlgorithm {
    type Err = SignatureAlgorithmParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SignatureAlgorithm::parse(s).ok_or_else(|| SignatureAlgorithmParseError {
            value: s.to_string(),
        })
    }
}

#[cfg(feature = "clap")]
impl clap::ValueEnum for SignatureAlgorithm {
    fn value_variants<'a>() -> &'a [Self] {
        &SignatureAlgorithm::ALL
    }

    fn to_possible_value(&self) -> Option<clap::builder::PossibleValue> {
        match self {
            SignatureAlgorithm::Ed25519 => Some(clap::builder::PossibleValue::new("ed25519")),
            SignatureAlgorithm::Secp256r1 => {
                Some(clap::builder::PossibleValue::new("secp256r1").alias("p256"))
            }
        }
    }
}

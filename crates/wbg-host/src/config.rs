use std::fmt;
use std::str::FromStr;

use anyhow::Context;
use wbg_contracts::ENV_UNKNOWN_IMPORTS;

/// Start of the host-only typed-array handle range. Guest memories never
/// grow this far in practice; the registry still refuses to hand out a
/// synthetic handle that would alias live guest bytes.
pub const DEFAULT_SYNTHETIC_HANDLE_BASE: u32 = 0xF000_0000;

/// What the stub builder does with an import in a supported namespace whose
/// role it does not recognize.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum UnknownImportPolicy {
    /// Fail binding; the guest needs something this host does not emulate.
    #[default]
    Reject,
    /// Bind a signature-preserving no-op that zero-fills its results.
    NoOp,
}

impl UnknownImportPolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            UnknownImportPolicy::Reject => "reject",
            UnknownImportPolicy::NoOp => "noop",
        }
    }
}

impl fmt::Display for UnknownImportPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct UnknownImportPolicyParseError {
    value: String,
}

impl fmt::Display for UnknownImportPolicyParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "invalid unknown-import policy {:?} (expected one of: reject, noop)",
            self.value
        )
    }
}

impl std::error::Error for UnknownImportPolicyParseError {}

impl FromStr for UnknownImportPolicy {
    type Err = UnknownImportPolicyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_ascii_lowercase();
        match s.as_str() {
            "reject" | "strict" => Ok(UnknownImportPolicy::Reject),
            "noop" | "no-op" => Ok(UnknownImportPolicy::NoOp),
            _ => Err(UnknownImportPolicyParseError { value: s }),
        }
    }
}

#[cfg(feature = "clap")]
impl clap::ValueEnum for UnknownImportPolicy {
    fn value_variants<'a>() -> &'a [Self] {
        const ALL: [UnknownImportPolicy; 2] =
            [UnknownImportPolicy::Reject, UnknownImportPolicy::NoOp];
        &ALL
    }

    fn to_possible_value(&self) -> Option<clap::builder::PossibleValue> {
        match self {
            UnknownImportPolicy::Reject => {
                Some(clap::builder::PossibleValue::new("reject").alias("strict"))
            }
            UnknownImportPolicy::NoOp => {
                Some(clap::builder::PossibleValue::new("noop").alias("no-op"))
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct HostConfig {
    pub unknown_imports: UnknownImportPolicy,
    /// Intern equal strings from `string-new` under one handle.
    pub dedupe_strings: bool,
    pub synthetic_handle_base: u32,
}

impl Default for HostConfig {
    fn default() -> Self {
        HostConfig {
            unknown_imports: UnknownImportPolicy::default(),
            dedupe_strings: true,
            synthetic_handle_base: DEFAULT_SYNTHETIC_HANDLE_BASE,
        }
    }
}

fn read_unknown_imports_env() -> anyhow::Result<Option<UnknownImportPolicy>> {
    let Ok(raw) = std::env::var(ENV_UNKNOWN_IMPORTS) else {
        return Ok(None);
    };
    let policy = UnknownImportPolicy::from_str(&raw)
        .with_context(|| format!("invalid environment variable {ENV_UNKNOWN_IMPORTS}={raw:?}"))?;
    Ok(Some(policy))
}

fn resolve_unknown_imports_with_env(
    cli_policy: Option<UnknownImportPolicy>,
    env_policy: Option<UnknownImportPolicy>,
) -> UnknownImportPolicy {
    cli_policy.or(env_policy).unwrap_or_default()
}

/// Command line wins over `WBG_UNKNOWN_IMPORTS`, which wins over the default.
pub fn resolve_unknown_imports(
    cli_policy: Option<UnknownImportPolicy>,
) -> anyhow::Result<UnknownImportPolicy> {
    let env_policy = read_unknown_imports_env()?;
    Ok(resolve_unknown_imports_with_env(cli_policy, env_policy))
}

use std::fmt;

/// Build details embedded by `build.rs`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildMetadata {
    pub version: &'static str,
    pub git_hash: &'static str,
    pub git_status: &'static str,
    pub timestamp: &'static str,
    pub target: &'static str,
    pub profile: &'static str,
    pub rustc: &'static str,
}

impl BuildMetadata {
    pub fn current() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION"),
            git_hash: option_env!("BUZZKILL_BUILD_HASH").unwrap_or("unknown"),
            git_status: option_env!("BUZZKILL_BUILD_STATUS").unwrap_or("unknown"),
            timestamp: option_env!("BUZZKILL_BUILD_TIMESTAMP").unwrap_or("unknown"),
            target: option_env!("BUZZKILL_BUILD_TARGET").unwrap_or("unknown-target"),
            profile: option_env!("BUZZKILL_BUILD_PROFILE").unwrap_or("unknown-profile"),
            rustc: option_env!("BUZZKILL_BUILD_RUSTC").unwrap_or("unknown"),
        }
    }

    /// `0.1.0 (abc1234, dirty)` style one-liner.
    pub fn short(&self) -> String {
        if self.git_status == "clean" {
            format!("{} ({})", self.version, self.git_hash)
        } else {
            format!("{} ({}, {})", self.version, self.git_hash, self.git_status)
        }
    }
}

impl fmt::Display for BuildMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "buzzkill {}", self.short())?;
        writeln!(f, "built:   {}", self.timestamp)?;
        writeln!(f, "target:  {} [{}]", self.target, self.profile)?;
        write!(f, "rustc:   {}", self.rustc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_form_starts_with_package_version() {
        let meta = BuildMetadata::current();
        assert!(meta.short().starts_with(env!("CARGO_PKG_VERSION")));
        assert!(meta.to_string().contains("target:"));
    }
}

use chrono::DateTime;

/// Build metadata, injected at compile time by the release pipeline through
/// `GAMEDL_COMMIT` and `GAMEDL_BUILD_DATE` (RFC 3339).
#[derive(Debug, Clone)]
pub struct BuildInfo {
    pub version: &'static str,
    pub commit: &'static str,
    pub date: &'static str,
}

impl BuildInfo {
    pub fn current() -> Self {
        BuildInfo {
            version: env!("CARGO_PKG_VERSION"),
            commit: option_env!("GAMEDL_COMMIT").unwrap_or("none"),
            date: option_env!("GAMEDL_BUILD_DATE").unwrap_or("unknown"),
        }
    }

    pub fn render(&self, verbose: bool) -> String {
        if !verbose {
            return self.version.to_string();
        }
        format!(
            "version: {}\ncommit: {}\nbuilt: {}",
            self.version,
            self.commit,
            format_build_date(self.date)
        )
    }
}

fn format_build_date(date: &str) -> String {
    match DateTime::parse_from_rfc3339(date) {
        Ok(parsed) => parsed.format("%Y-%m-%d %H:%M:%S %:z").to_string(),
        Err(_) => date.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(date: &'static str) -> BuildInfo {
        BuildInfo {
            version: "1.2.3",
            commit: "abc1234",
            date,
        }
    }

    #[test]
    fn test_short_version() {
        assert_eq!(info("unknown").render(false), "1.2.3");
    }

    #[test]
    fn test_verbose_formats_rfc3339_date() {
        assert_eq!(
            info("2024-03-01T12:30:00Z").render(true),
            "version: 1.2.3\ncommit: abc1234\nbuilt: 2024-03-01 12:30:00 +00:00"
        );
    }

    #[test]
    fn test_verbose_keeps_unparseable_date() {
        assert!(info("unknown").render(true).ends_with("built: unknown"));
    }
}

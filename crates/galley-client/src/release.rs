//! Release channel: where new agent builds are published.
//!
//! `{base}/latest` lists the available releases as `label: version` lines,
//! for example:
//!
//! ```text
//! Current version:     24.04
//! Available LTS:       26.04 LTS
//! Available non-LTS:   26.10
//! ```
//!
//! Binaries live at `{base}/bin/{version}/galley-{target}`.

use reqwest::Client as HttpClient;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Budget for the startup check; it must never hold up a command
pub const CHECK_TIMEOUT: Duration = Duration::from_secs(2);

/// Budget for downloading a binary
pub const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(300);

const USER_AGENT: &str = "Galley Node Agent";

/// Release channel failures
#[derive(Error, Debug)]
pub enum ReleaseError {
    /// The download base is not an HTTP(S) URL
    #[error("invalid download base {url:?}: {reason}")]
    InvalidUrl {
        /// URL as given
        url: String,
        /// Why it was rejected
        reason: String,
    },

    /// The HTTP client could not be built
    #[error("cannot set up the download client")]
    ClientSetup(#[source] reqwest::Error),

    /// No response was received
    #[error("cannot reach {url}")]
    Unreachable {
        /// Requested URL
        url: String,
        /// Transport error
        #[source]
        source: reqwest::Error,
    },

    /// The server answered with something other than 200
    #[error("{url} answered with status {code}")]
    UnexpectedStatus {
        /// Requested URL
        url: String,
        /// HTTP status code
        code: u16,
    },

    /// The server answered 200 with an empty body
    #[error("{url} returned an empty binary")]
    EmptyBinary {
        /// Requested URL
        url: String,
    },

    /// No build is published for this platform
    #[error("no galley build for {os}/{arch}")]
    UnsupportedPlatform {
        /// Operating system
        os: String,
        /// CPU architecture
        arch: String,
    },
}

/// Download target for an OS and CPU architecture, as named by
/// [`std::env::consts`].
#[must_use]
pub fn release_target(os: &str, arch: &str) -> Option<&'static str> {
    match (os, arch) {
        ("linux", "x86_64") => Some("linux-amd64"),
        ("linux", "aarch64") => Some("linux-arm64"),
        ("linux", "arm") => Some("linux-armv7"),
        _ => None,
    }
}

/// Download target of the running binary
pub fn current_target() -> Result<&'static str, ReleaseError> {
    let (os, arch) = (std::env::consts::OS, std::env::consts::ARCH);
    release_target(os, arch).ok_or_else(|| ReleaseError::UnsupportedPlatform {
        os: os.to_string(),
        arch: arch.to_string(),
    })
}

/// A release the operator may update to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateOffer {
    /// Version as published, used in the download path
    pub version: String,
    /// Long-term support release
    pub lts: bool,
}

impl UpdateOffer {
    /// Version without a leading `v`
    #[must_use]
    pub fn display_version(&self) -> &str {
        strip_v(&self.version)
    }
}

/// Releases listed by `{base}/latest`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AvailableReleases {
    /// Newest long-term support release
    pub lts: Option<String>,
    /// Newest release without long-term support
    pub other: Option<String>,
}

impl AvailableReleases {
    /// Parse the `latest` listing. Only lines mentioning "available" count;
    /// a value ending in `LTS` is the LTS release whatever its label says.
    #[must_use]
    pub fn parse(listing: &str) -> Self {
        let mut releases = Self::default();
        for line in listing.lines() {
            if !line.to_lowercase().contains("available") {
                continue;
            }
            let Some((_, value)) = line.split_once(':') else {
                continue;
            };
            let value = value.trim();
            let split = value.len().saturating_sub(3);
            let lts = value
                .get(split..)
                .is_some_and(|tail| tail.eq_ignore_ascii_case("lts"));
            let version = if lts { &value[..split] } else { value }.trim();
            if version.is_empty() {
                continue;
            }
            if lts {
                releases.lts = Some(version.to_string());
            } else {
                releases.other = Some(version.to_string());
            }
        }
        releases
    }

    /// Releases that differ from `current`, LTS first. A non-LTS release
    /// equal to the LTS one is not offered twice.
    #[must_use]
    pub fn offers(&self, current: &str) -> Vec<UpdateOffer> {
        let current = strip_v(current);
        let mut offers = Vec::new();
        if let Some(lts) = &self.lts {
            if strip_v(lts) != current {
                offers.push(UpdateOffer {
                    version: lts.clone(),
                    lts: true,
                });
            }
        }
        if let Some(other) = &self.other {
            let same_as_lts = self.lts.as_deref().map(strip_v) == Some(strip_v(other));
            if strip_v(other) != current && !same_as_lts {
                offers.push(UpdateOffer {
                    version: other.clone(),
                    lts: false,
                });
            }
        }
        offers
    }
}

fn strip_v(version: &str) -> &str {
    version.strip_prefix('v').unwrap_or(version)
}

/// HTTP access to a download base
#[derive(Debug, Clone)]
pub struct ReleaseChannel {
    http: HttpClient,
    base_url: String,
}

impl ReleaseChannel {
    /// Channel at `download_base`; every request is bounded by `timeout`
    pub fn new(download_base: &str, timeout: Duration) -> Result<Self, ReleaseError> {
        let base_url = download_base.trim().trim_end_matches('/').to_string();
        let parsed = url::Url::parse(&base_url).map_err(|e| ReleaseError::InvalidUrl {
            url: download_base.to_string(),
            reason: e.to_string(),
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ReleaseError::InvalidUrl {
                url: download_base.to_string(),
                reason: format!("unsupported scheme {}", parsed.scheme()),
            });
        }

        let http = HttpClient::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(ReleaseError::ClientSetup)?;
        Ok(Self { http, base_url })
    }

    /// URL of the `target` binary for `version`
    #[must_use]
    pub fn binary_url(&self, version: &str, target: &str) -> String {
        format!("{}/bin/{version}/galley-{target}", self.base_url)
    }

    /// Fetch and parse the release listing
    pub async fn available(&self) -> Result<AvailableReleases, ReleaseError> {
        let url = format!("{}/latest", self.base_url);
        let listing = self.fetch(&url).await?;
        Ok(AvailableReleases::parse(&String::from_utf8_lossy(&listing)))
    }

    /// Download the `target` binary for `version`
    pub async fn download(&self, version: &str, target: &str) -> Result<Vec<u8>, ReleaseError> {
        let url = self.binary_url(version, target);
        let binary = self.fetch(&url).await?;
        if binary.is_empty() {
            return Err(ReleaseError::EmptyBinary { url });
        }
        debug!(url = %url, bytes = binary.len(), "binary downloaded");
        Ok(binary)
    }

    async fn fetch(&self, url: &str) -> Result<Vec<u8>, ReleaseError> {
        let unreachable = |source| ReleaseError::Unreachable {
            url: url.to_string(),
            source,
        };
        let response = self.http.get(url).send().await.map_err(unreachable)?;
        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(ReleaseError::UnexpectedStatus {
                url: url.to_string(),
                code: status.as_u16(),
            });
        }
        let body = response.bytes().await.map_err(unreachable)?;
        Ok(body.to_vec())
    }
}

use std::path::PathBuf;
use std::time::Duration;

/// Service type browsed by the default mDNS scanner
pub const DEFAULT_SERVICE_TYPE: &str = "_ocast._tcp.local.";

/// Location and passwords of the bundled certificate material
#[derive(Debug, Clone)]
pub struct CertificateConfig {
    /// Directory holding all certificate files
    pub directory: PathBuf,

    /// Device root CA (DER)
    pub root_ca_file: String,

    /// Device firmware/server CA (DER)
    pub server_ca_file: String,

    /// Primary client certificate (PKCS#12)
    pub client_certificate_file: String,

    /// Password of the primary client certificate
    pub client_certificate_password: String,

    /// Fallback client certificate (PKCS#12), tried after the primary fails
    pub fallback_certificate_file: String,

    /// Password of the fallback client certificate
    pub fallback_certificate_password: String,
}

impl Default for CertificateConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("certs"),
            root_ca_file: "device_root_ca.der".to_string(),
            server_ca_file: "device_firmware_ca.der".to_string(),
            client_certificate_file: "client.p12".to_string(),
            client_certificate_password: String::new(),
            fallback_certificate_file: "client_legacy.p12".to_string(),
            fallback_certificate_password: String::new(),
        }
    }
}

/// Configuration for bridge behavior
#[derive(Debug, Clone)]
pub struct CastConfig {
    /// Interval between discovery rounds while in the foreground (default: 5 seconds)
    pub discovery_interval: Duration,

    /// Interval between discovery rounds while backgrounded (default: 30 seconds)
    pub background_discovery_interval: Duration,

    /// How long a single discovery round listens for answers (default: 2 seconds)
    pub scan_window: Duration,

    /// Consecutive rounds a device may be missing before it is reported lost (default: 2)
    pub lost_after_missed_scans: u32,

    /// Upper bound for every network-facing operation (default: 5 seconds)
    pub operation_timeout: Duration,

    /// mDNS service type browsed by the default scanner
    pub service_type: String,

    /// Prefix prepended to event names when exported to the host (default: "OCast:")
    pub event_prefix: String,

    /// Certificate bundle used by the secure channel
    pub certificates: CertificateConfig,
}

impl Default for CastConfig {
    fn default() -> Self {
        Self {
            discovery_interval: Duration::from_secs(5),
            background_discovery_interval: Duration::from_secs(30),
            scan_window: Duration::from_secs(2),
            lost_after_missed_scans: 2,
            operation_timeout: Duration::from_secs(5),
            service_type: DEFAULT_SERVICE_TYPE.to_string(),
            event_prefix: "OCast:".to_string(),
            certificates: CertificateConfig::default(),
        }
    }
}

impl CastConfig {
    /// Create a new config builder
    #[must_use]
    pub fn builder() -> CastConfigBuilder {
        CastConfigBuilder::default()
    }
}

/// Builder for `CastConfig`
#[derive(Debug, Clone, Default)]
pub struct CastConfigBuilder {
    config: CastConfig,
}

impl CastConfigBuilder {
    /// Set foreground discovery interval
    #[must_use]
    pub fn discovery_interval(mut self, interval: Duration) -> Self {
        self.config.discovery_interval = interval;
        self
    }

    /// Set background discovery interval
    #[must_use]
    pub fn background_discovery_interval(mut self, interval: Duration) -> Self {
        self.config.background_discovery_interval = interval;
        self
    }

    /// Set how long one discovery round listens
    #[must_use]
    pub fn scan_window(mut self, window: Duration) -> Self {
        self.config.scan_window = window;
        self
    }

    /// Set how many missed rounds mark a device as lost (minimum 1)
    #[must_use]
    pub fn lost_after_missed_scans(mut self, rounds: u32) -> Self {
        self.config.lost_after_missed_scans = rounds.max(1);
        self
    }

    /// Set the per-operation timeout
    #[must_use]
    pub fn operation_timeout(mut self, timeout: Duration) -> Self {
        self.config.operation_timeout = timeout;
        self
    }

    /// Set the mDNS service type
    #[must_use]
    pub fn service_type(mut self, service_type: impl Into<String>) -> Self {
        self.config.service_type = service_type.into();
        self
    }

    /// Set the exported event name prefix
    #[must_use]
    pub fn event_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.event_prefix = prefix.into();
        self
    }

    /// Set the certificate directory
    #[must_use]
    pub fn certificate_directory(mut self, directory: impl Into<PathBuf>) -> Self {
        self.config.certificates.directory = directory.into();
        self
    }

    /// Set the primary client certificate file and password
    #[must_use]
    pub fn client_certificate(
        mut self,
        file: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.config.certificates.client_certificate_file = file.into();
        self.config.certificates.client_certificate_password = password.into();
        self
    }

    /// Set the fallback client certificate file and password
    #[must_use]
    pub fn fallback_certificate(
        mut self,
        file: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.config.certificates.fallback_certificate_file = file.into();
        self.config.certificates.fallback_certificate_password = password.into();
        self
    }

    /// Replace the whole certificate configuration
    #[must_use]
    pub fn certificates(mut self, certificates: CertificateConfig) -> Self {
        self.config.certificates = certificates;
        self
    }

    /// Build the configuration
    #[must_use]
    pub fn build(self) -> CastConfig {
        self.config
    }
}

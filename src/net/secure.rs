//! Secure channel material for device connections
//!
//! Devices authenticate the controller with a client certificate and present
//! a certificate chain rooted in the vendor CAs. Two client certificates are
//! bundled: the current one and a legacy one still expected by older
//! firmware. The produced configuration keeps host and chain validation off
//! because device firmware presents certificates that do not pass them.

use std::fmt;
use std::path::Path;

use crate::error::{CastError, Result};
use crate::types::CertificateConfig;

/// Which client certificate a connection attempt uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CertificateVariant {
    /// Current client certificate
    Primary,
    /// Legacy client certificate, tried after the primary fails
    Fallback,
}

impl CertificateVariant {
    /// Order in which variants are attempted
    pub const ATTEMPT_ORDER: [CertificateVariant; 2] =
        [CertificateVariant::Primary, CertificateVariant::Fallback];

    /// Map the "use fallback certificate" flag to a variant
    #[must_use]
    pub fn from_fallback_flag(use_fallback: bool) -> Self {
        if use_fallback {
            CertificateVariant::Fallback
        } else {
            CertificateVariant::Primary
        }
    }

    /// Check if this is the fallback variant
    #[must_use]
    pub fn is_fallback(self) -> bool {
        matches!(self, CertificateVariant::Fallback)
    }
}

/// Certificates and validation flags for one connection attempt
#[derive(Clone)]
pub struct SecureChannelConfig {
    /// Variant this configuration was built for
    pub variant: CertificateVariant,
    /// Device root CA (DER)
    pub root_ca: Vec<u8>,
    /// Device firmware CA (DER)
    pub server_ca: Vec<u8>,
    /// Client certificate and key (PKCS#12)
    pub client_identity: Vec<u8>,
    /// Password protecting `client_identity`
    pub client_password: String,
    /// Verify the device hostname
    pub validates_host: bool,
    /// Verify the device certificate chain
    pub validates_chain: bool,
}

impl SecureChannelConfig {
    /// Build a TLS connector for transports speaking TLS to the device
    ///
    /// # Errors
    ///
    /// Returns `Tls` if the client identity cannot be decrypted or a CA is not valid DER.
    pub fn tls_connector(&self) -> Result<native_tls::TlsConnector> {
        let identity =
            native_tls::Identity::from_pkcs12(&self.client_identity, &self.client_password)?;

        let mut builder = native_tls::TlsConnector::builder();
        builder.identity(identity);
        for der in [&self.root_ca, &self.server_ca] {
            builder.add_root_certificate(native_tls::Certificate::from_der(der)?);
        }
        builder.danger_accept_invalid_hostnames(!self.validates_host);
        builder.danger_accept_invalid_certs(!self.validates_chain);

        Ok(builder.build()?)
    }
}

impl fmt::Debug for SecureChannelConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecureChannelConfig")
            .field("variant", &self.variant)
            .field("root_ca_len", &self.root_ca.len())
            .field("server_ca_len", &self.server_ca.len())
            .field("client_identity_len", &self.client_identity.len())
            .field("validates_host", &self.validates_host)
            .field("validates_chain", &self.validates_chain)
            .finish_non_exhaustive()
    }
}

/// Loads certificate material for connection attempts
#[derive(Debug, Clone)]
pub struct SecureChannelFactory {
    config: CertificateConfig,
}

impl SecureChannelFactory {
    /// Create a factory reading from the configured certificate directory
    #[must_use]
    pub fn new(config: CertificateConfig) -> Self {
        Self { config }
    }

    /// Build the configuration for the primary (`false`) or fallback (`true`) certificate
    ///
    /// # Errors
    ///
    /// Returns `Certificate` if any required file is missing, unreadable or empty.
    pub fn build(&self, use_fallback: bool) -> Result<SecureChannelConfig> {
        self.build_variant(CertificateVariant::from_fallback_flag(use_fallback))
    }

    /// Build the configuration for a specific variant
    ///
    /// # Errors
    ///
    /// Returns `Certificate` if any required file is missing, unreadable or empty.
    pub fn build_variant(&self, variant: CertificateVariant) -> Result<SecureChannelConfig> {
        let (client_file, client_password) = match variant {
            CertificateVariant::Primary => (
                &self.config.client_certificate_file,
                &self.config.client_certificate_password,
            ),
            CertificateVariant::Fallback => (
                &self.config.fallback_certificate_file,
                &self.config.fallback_certificate_password,
            ),
        };

        let channel = SecureChannelConfig {
            variant,
            root_ca: self.read(&self.config.root_ca_file)?,
            server_ca: self.read(&self.config.server_ca_file)?,
            client_identity: self.read(client_file)?,
            client_password: client_password.clone(),
            validates_host: false,
            validates_chain: false,
        };

        tracing::debug!("Secure channel configuration ready: {:?}", channel);
        Ok(channel)
    }

    fn read(&self, file: &str) -> Result<Vec<u8>> {
        let path = self.config.directory.join(file);
        let data = std::fs::read(&path).map_err(|e| CastError::Certificate {
            message: format!("cannot read {}", path.display()),
            source: Some(Box::new(e)),
        })?;

        if data.is_empty() {
            return Err(empty_file(&path));
        }
        Ok(data)
    }
}

fn empty_file(path: &Path) -> CastError {
    CastError::Certificate {
        message: format!("{} is empty", path.display()),
        source: None,
    }
}

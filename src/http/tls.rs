//! TLS configuration and certificate loading.

use axum_server::tls_rustls::RustlsConfig;
use std::path::Path;

/// Load the listener's certificate chain and key (PEM).
pub async fn load_tls_config(cert_path: &Path, key_path: &Path) -> Result<RustlsConfig, std::io::Error> {
    for (what, path) in [("Certificate", cert_path), ("Private key", key_path)] {
        if !path.exists() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("{} file not found: {:?}", what, path),
            ));
        }
    }

    RustlsConfig::from_pem_file(cert_path, key_path).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_files_are_reported() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_tls_config(&dir.path().join("cert.pem"), &dir.path().join("key.pem"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::NotFound);
        assert!(err.to_string().contains("Certificate"));
    }
}

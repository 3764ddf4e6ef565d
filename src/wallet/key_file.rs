use crate::core::{KeyPair, PrivateKey, PublicKey};
use crate::error::{LedgerError, Result};
use log::debug;
use std::fs::{self, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;

const PUBLIC_KEY_PREFIX: &str = "PublicKey: ";
const PRIVATE_KEY_PREFIX: &str = "PrivateKey: ";

/// Load the node's key pair from `path`, generating and saving a new one
/// when the file does not exist
pub fn load_or_generate(path: &Path) -> Result<KeyPair> {
    if path.exists() {
        debug!("loading {}", path.display());
        let key_pair = load_key_pair(path)?;
        debug!("keys loaded successfully");
        return Ok(key_pair);
    }

    debug!("generating new keys, no {} found", path.display());
    let key_pair = KeyPair::generate()?;
    save_key_pair(path, &key_pair)?;
    debug!("PublicKey: {}", key_pair.public_key());
    Ok(key_pair)
}

/// Write `PublicKey: <hex>` and `PrivateKey: <hex>` lines, replacing any existing file
pub fn save_key_pair(path: &Path, key_pair: &KeyPair) -> Result<()> {
    let mut options = OpenOptions::new();
    options.create(true).truncate(true).write(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let file = options
        .open(path)
        .map_err(|e| LedgerError::Io(format!("Failed to create {}: {e}", path.display())))?;
    let mut writer = BufWriter::new(file);
    writeln!(writer, "{PUBLIC_KEY_PREFIX}{}", key_pair.public_key().to_hex())?;
    writeln!(writer, "{PRIVATE_KEY_PREFIX}{}", key_pair.private_key().to_hex())?;
    writer.flush()?;
    Ok(())
}

/// Parse a key file. The private key must embed the listed public key.
pub fn load_key_pair(path: &Path) -> Result<KeyPair> {
    let contents = fs::read_to_string(path)
        .map_err(|e| LedgerError::Io(format!("Failed to read {}: {e}", path.display())))?;

    let mut public_key = None;
    let mut private_key = None;
    for line in contents.lines() {
        if let Some(hex) = line.strip_prefix(PUBLIC_KEY_PREFIX) {
            public_key = Some(PublicKey::from_hex(hex.trim())?);
        } else if let Some(hex) = line.strip_prefix(PRIVATE_KEY_PREFIX) {
            private_key = Some(PrivateKey::from_hex(hex.trim())?);
        }
    }

    let private_key = private_key.ok_or_else(|| {
        LedgerError::MalformedValue(format!("{} has no PrivateKey line", path.display()))
    })?;
    let key_pair = KeyPair::from_private_key(private_key)?;

    if let Some(public_key) = public_key {
        if public_key != key_pair.public_key() {
            return Err(LedgerError::Crypto(format!(
                "{} lists a public key that does not match its private key",
                path.display()
            )));
        }
    }
    Ok(key_pair)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Settings, DEFAULT_KEY_FILE};

    #[test]
    fn test_generate_then_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DEFAULT_KEY_FILE);

        let generated = load_or_generate(&path).unwrap();
        assert!(path.exists());

        let reloaded = load_or_generate(&path).unwrap();
        assert_eq!(reloaded, generated);
    }

    #[test]
    fn test_file_format() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DEFAULT_KEY_FILE);
        let key_pair = KeyPair::generate().unwrap();
        save_key_pair(&path, &key_pair).unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], format!("PublicKey: {}", key_pair.public_key().to_hex()));
        assert!(lines[1].starts_with("PrivateKey: "));
        assert_eq!(lines[1].len(), "PrivateKey: ".len() + 128);
    }

    #[cfg(unix)]
    #[test]
    fn test_key_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DEFAULT_KEY_FILE);
        load_or_generate(&path).unwrap();

        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_mismatched_public_key_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DEFAULT_KEY_FILE);
        let ours = KeyPair::generate().unwrap();
        let theirs = KeyPair::generate().unwrap();
        fs::write(
            &path,
            format!(
                "PublicKey: {}\nPrivateKey: {}\n",
                theirs.public_key().to_hex(),
                ours.private_key().to_hex()
            ),
        )
        .unwrap();

        assert!(matches!(load_key_pair(&path), Err(LedgerError::Crypto(_))));
    }

    #[test]
    fn test_missing_private_key_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DEFAULT_KEY_FILE);
        let key_pair = KeyPair::generate().unwrap();
        fs::write(&path, format!("PublicKey: {}\n", key_pair.public_key().to_hex())).unwrap();

        assert!(matches!(
            load_key_pair(&path),
            Err(LedgerError::MalformedValue(_))
        ));
    }

    #[test]
    fn test_bad_hex_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DEFAULT_KEY_FILE);
        fs::write(&path, "PrivateKey: not-hex\n").unwrap();

        assert!(load_key_pair(&path).is_err());
    }

    #[test]
    fn test_default_settings_locate_the_key_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(Settings::default().key_file);

        let generated = load_or_generate(&path).unwrap();
        assert!(dir.path().join("keys.txt").is_file());
        assert_eq!(
            load_key_pair(&dir.path().join(DEFAULT_KEY_FILE))
                .unwrap()
                .public_key(),
            generated.public_key()
        );
    }
}

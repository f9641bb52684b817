use std::path::Path;

use super::ApiError;

/// Largest avatar image the API accepts (3 MB)
pub const MAX_AVATAR_BYTES: u64 = 3 * 1024 * 1024;

/// Image extensions accepted for avatars
const ALLOWED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

/// An avatar image read from disk and checked for upload.
#[derive(Debug, Clone)]
pub struct AvatarUpload {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl AvatarUpload {
    /// Read an image and name it after the user, e.g. `anasilva.png`.
    pub fn from_path(path: &Path, user_name: &str) -> Result<Self, ApiError> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .filter(|e| ALLOWED_EXTENSIONS.contains(&e.as_str()))
            .ok_or_else(|| {
                ApiError::Avatar(format!(
                    "Unsupported image type for {} (use jpg or png)",
                    path.display()
                ))
            })?;

        let size = std::fs::metadata(path)
            .map_err(|e| ApiError::Avatar(format!("Cannot read {}: {}", path.display(), e)))?
            .len();
        if size > MAX_AVATAR_BYTES {
            return Err(ApiError::Avatar(
                "This image is too large. Choose one up to 3 MB.".to_string(),
            ));
        }

        let bytes = std::fs::read(path)
            .map_err(|e| ApiError::Avatar(format!("Cannot read {}: {}", path.display(), e)))?;

        Ok(Self {
            file_name: Self::file_name_for(user_name, &extension),
            mime_type: format!("image/{}", extension),
            bytes,
        })
    }

    fn file_name_for(user_name: &str, extension: &str) -> String {
        let stem: String = user_name
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect::<String>()
            .to_lowercase();
        let stem = if stem.is_empty() { "avatar".to_string() } else { stem };
        format!("{}.{}", stem, extension)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_file(dir: &Path, name: &str, size: usize) -> std::path::PathBuf {
        let path = dir.join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(&vec![0u8; size]).unwrap();
        path
    }

    #[test]
    fn test_from_path_accepts_small_png() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(dir.path(), "photo.PNG", 1024);

        let upload = AvatarUpload::from_path(&path, "Ana Silva").unwrap();
        assert_eq!(upload.file_name, "anasilva.png");
        assert_eq!(upload.mime_type, "image/png");
        assert_eq!(upload.bytes.len(), 1024);
    }

    #[test]
    fn test_from_path_rejects_large_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(dir.path(), "big.jpg", (MAX_AVATAR_BYTES + 1) as usize);

        let err = AvatarUpload::from_path(&path, "Ana").unwrap_err();
        assert!(err.to_string().contains("3 MB"));
    }

    #[test]
    fn test_from_path_rejects_unknown_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(dir.path(), "notes.txt", 10);
        assert!(matches!(AvatarUpload::from_path(&path, "Ana"), Err(ApiError::Avatar(_))));
    }

    #[test]
    fn test_file_name_for_blank_user() {
        assert_eq!(AvatarUpload::file_name_for("  ", "jpg"), "avatar.jpg");
    }
}

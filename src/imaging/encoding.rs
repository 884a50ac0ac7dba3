// Base64 preview helpers
use crate::utils::{BridgeError, BridgeResult};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use std::path::Path;

/// MIME type from the file extension, `image/jpeg` when unknown
pub fn mime_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);

    match ext.as_deref() {
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        Some("gif") => "image/gif",
        Some("bmp") => "image/bmp",
        Some("svg") => "image/svg+xml",
        _ => "image/jpeg",
    }
}

pub async fn read_base64(path: &Path) -> BridgeResult<String> {
    let data = tokio::fs::read(path)
        .await
        .map_err(|e| BridgeError::file_read(path.to_string_lossy(), e))?;
    Ok(BASE64.encode(&data))
}

pub async fn read_data_url(path: &Path) -> BridgeResult<String> {
    let encoded = read_base64(path).await?;
    Ok(format!("data:{};base64,{}", mime_type_for(path), encoded))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mime_type_for_extensions() {
        assert_eq!(mime_type_for(Path::new("/x/a.PNG")), "image/png");
        assert_eq!(mime_type_for(Path::new("/x/a.svg")), "image/svg+xml");
        assert_eq!(mime_type_for(Path::new("/x/a.jpeg")), "image/jpeg");
        assert_eq!(mime_type_for(Path::new("/x/noext")), "image/jpeg");
    }

    #[tokio::test]
    async fn test_read_base64_and_data_url() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tiny.gif");
        std::fs::write(&path, b"GIF89a").unwrap();

        assert_eq!(read_base64(&path).await.unwrap(), "R0lGODlh");
        assert_eq!(read_data_url(&path).await.unwrap(), "data:image/gif;base64,R0lGODlh");
    }

    #[tokio::test]
    async fn test_missing_file_is_file_read_error() {
        let err = read_base64(Path::new("/definitely/not/here.png")).await.unwrap_err();
        assert!(matches!(err, BridgeError::FileRead { .. }));
    }
}

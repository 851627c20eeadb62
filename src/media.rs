//! 上传文件的保存：media_dir/<类别>/<uuid>.<扩展名>

use axum::extract::Multipart;
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Logo,
    OfferImage,
    Receipt,
}

const IMAGE_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "webp"];

impl MediaKind {
    pub fn dir(&self) -> &'static str {
        match self {
            MediaKind::Logo => "logos",
            MediaKind::OfferImage => "offers",
            MediaKind::Receipt => "receipts",
        }
    }

    pub fn max_bytes(&self) -> usize {
        match self {
            MediaKind::Logo => 2 * 1024 * 1024,
            MediaKind::OfferImage => 3 * 1024 * 1024,
            MediaKind::Receipt => 5 * 1024 * 1024,
        }
    }

    fn allows(&self, ext: &str) -> bool {
        IMAGE_EXTENSIONS.contains(&ext) || (*self == MediaKind::Receipt && ext == "pdf")
    }
}

/// 一个上传的文件
#[derive(Debug, Clone)]
pub struct Upload {
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// 解析后的 multipart 表单：文件按字段名分组，其余为文本字段
#[derive(Debug, Default)]
pub struct MultipartForm {
    pub files: Vec<(String, Upload)>,
    pub fields: HashMap<String, String>,
}

impl MultipartForm {
    pub async fn read(mut multipart: Multipart) -> AppResult<Self> {
        let mut form = MultipartForm::default();
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| AppError::bad_request(format!("بيانات النموذج غير صالحة: {}", e)))?
        {
            let name = field.name().unwrap_or_default().to_string();
            match field.file_name().map(str::to_string) {
                Some(filename) => {
                    let bytes = field
                        .bytes()
                        .await
                        .map_err(|e| AppError::bad_request(format!("تعذر قراءة الملف: {}", e)))?;
                    form.files.push((
                        name,
                        Upload {
                            filename,
                            bytes: bytes.to_vec(),
                        },
                    ));
                }
                None => {
                    let text = field
                        .text()
                        .await
                        .map_err(|e| AppError::bad_request(format!("بيانات النموذج غير صالحة: {}", e)))?;
                    form.fields.insert(name, text);
                }
            }
        }
        Ok(form)
    }

    /// 取第一个匹配字段名的文件
    pub fn take_file(&mut self, names: &[&str]) -> Option<Upload> {
        let index = self.files.iter().position(|(name, _)| names.contains(&name.as_str()))?;
        Some(self.files.remove(index).1)
    }

    pub fn take_files(&mut self, names: &[&str]) -> Vec<Upload> {
        let (taken, rest): (Vec<_>, Vec<_>) = std::mem::take(&mut self.files)
            .into_iter()
            .partition(|(name, _)| names.contains(&name.as_str()));
        self.files = rest;
        taken.into_iter().map(|(_, upload)| upload).collect()
    }

    pub fn field(&self, name: &str) -> Option<String> {
        self.fields
            .get(name)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }
}

fn extension_of(filename: &str) -> Option<String> {
    Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
}

/// 校验类型与大小，返回小写扩展名
pub fn check_upload(kind: MediaKind, upload: &Upload) -> AppResult<String> {
    let ext = extension_of(&upload.filename)
        .filter(|ext| kind.allows(ext))
        .ok_or_else(|| AppError::bad_request("نوع الملف غير مدعوم"))?;

    if upload.bytes.is_empty() {
        return Err(AppError::bad_request("الملف فارغ"));
    }
    if upload.bytes.len() > kind.max_bytes() {
        return Err(AppError::bad_request(format!(
            "حجم الملف يتجاوز الحد المسموح ({} ميجابايت)",
            kind.max_bytes() / (1024 * 1024)
        )));
    }
    Ok(ext)
}

/// 校验类型与大小后保存，返回相对 media_dir 的路径
pub async fn save_upload(media_dir: &Path, kind: MediaKind, upload: &Upload) -> AppResult<String> {
    let ext = check_upload(kind, upload)?;

    let dir = media_dir.join(kind.dir());
    tokio::fs::create_dir_all(&dir)
        .await
        .map_err(|e| anyhow::anyhow!("无法创建媒体目录 {}: {}", dir.display(), e))?;

    let relative = format!("{}/{}.{}", kind.dir(), Uuid::new_v4(), ext);
    let path = media_dir.join(&relative);
    tokio::fs::write(&path, &upload.bytes)
        .await
        .map_err(|e| anyhow::anyhow!("无法保存文件 {}: {}", path.display(), e))?;

    debug!("已保存上传文件: {} ({} 字节)", relative, upload.bytes.len());
    Ok(relative)
}

/// 删除已保存的文件，失败只记日志
pub async fn remove_upload(media_dir: &Path, relative: &str) {
    let path = media_dir.join(relative);
    if let Err(e) = tokio::fs::remove_file(&path).await {
        warn!("删除上传文件失败 {}: {}", path.display(), e);
    }
}

/// 后续处理失败时删掉本次保存的文件
pub async fn discard_on_error<T>(media_dir: &Path, saved: &[String], result: AppResult<T>) -> AppResult<T> {
    if result.is_err() {
        for relative in saved {
            remove_upload(media_dir, relative).await;
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upload(name: &str, size: usize) -> Upload {
        Upload {
            filename: name.to_string(),
            bytes: vec![0u8; size],
        }
    }

    #[test]
    fn test_allowed_extensions() {
        assert!(MediaKind::Logo.allows("png"));
        assert!(MediaKind::OfferImage.allows("webp"));
        assert!(!MediaKind::OfferImage.allows("pdf"));
        assert!(MediaKind::Receipt.allows("pdf"));
        assert!(!MediaKind::Receipt.allows("exe"));
        assert_eq!(extension_of("Photo.JPG").as_deref(), Some("jpg"));
        assert_eq!(extension_of("noext"), None);
    }

    #[tokio::test]
    async fn test_save_upload_limits() {
        let dir = std::env::temp_dir().join(format!("tawfir-media-{}", Uuid::new_v4()));

        let saved = save_upload(&dir, MediaKind::Logo, &upload("logo.png", 1024)).await.unwrap();
        assert!(saved.starts_with("logos/") && saved.ends_with(".png"));
        assert!(dir.join(&saved).exists());

        let too_big = upload("logo.png", MediaKind::Logo.max_bytes() + 1);
        assert!(matches!(
            save_upload(&dir, MediaKind::Logo, &too_big).await,
            Err(AppError::BadRequest(_))
        ));
        assert!(matches!(
            save_upload(&dir, MediaKind::OfferImage, &upload("menu.pdf", 10)).await,
            Err(AppError::BadRequest(_))
        ));
        assert!(save_upload(&dir, MediaKind::Receipt, &upload("r.pdf", 10)).await.is_ok());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_take_files_by_name() {
        let mut form = MultipartForm::default();
        form.files.push(("images".into(), upload("a.jpg", 1)));
        form.files.push(("receipt".into(), upload("r.pdf", 1)));
        form.files.push(("images".into(), upload("b.jpg", 1)));

        let images = form.take_files(&["images"]);
        assert_eq!(images.len(), 2);
        assert_eq!(form.take_file(&["receipt", "payment_receipt"]).unwrap().filename, "r.pdf");
        assert!(form.files.is_empty());
    }

    #[tokio::test]
    async fn test_discard_on_error_removes_saved_files() {
        let dir = std::env::temp_dir().join(format!("tawfir-media-{}", Uuid::new_v4()));
        let kept = save_upload(&dir, MediaKind::Receipt, &upload("a.pdf", 10)).await.unwrap();
        let dropped = save_upload(&dir, MediaKind::Receipt, &upload("b.pdf", 10)).await.unwrap();

        let ok: AppResult<()> = Ok(());
        discard_on_error(&dir, std::slice::from_ref(&kept), ok).await.unwrap();
        assert!(dir.join(&kept).exists());

        let failed: AppResult<()> = Err(AppError::bad_request("لا يمكن رفع إيصال لهذا الطلب"));
        assert!(discard_on_error(&dir, std::slice::from_ref(&dropped), failed).await.is_err());
        assert!(!dir.join(&dropped).exists());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_check_upload_does_not_touch_disk() {
        assert_eq!(check_upload(MediaKind::OfferImage, &upload("A.PNG", 10)).unwrap(), "png");
        assert!(check_upload(MediaKind::OfferImage, &upload("a.png", 0)).is_err());
        assert!(check_upload(MediaKind::OfferImage, &upload("a.gif", 10)).is_err());
    }
}

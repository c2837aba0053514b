use anyhow::{Context, Result};
use std::collections::HashSet;
use std::path::Path;

use connectsphere_types::Post;

/// An image file to upload with a post
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageFile {
    pub file_name: String,
    pub bytes: Vec<u8>,
    /// Declared MIME type; guessed from the file name when absent
    pub mime: Option<String>,
}

impl ImageFile {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            bytes,
            mime: None,
        }
    }

    pub fn with_mime(mut self, mime: impl Into<String>) -> Self {
        self.mime = Some(mime.into());
        self
    }

    /// Read an image from disk
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("image")
            .to_string();
        Ok(Self::new(file_name, bytes))
    }

    /// MIME type sent with the upload
    pub fn mime_type(&self) -> String {
        match &self.mime {
            Some(mime) => mime.clone(),
            None => mime_guess::from_path(&self.file_name)
                .first_or_octet_stream()
                .essence_str()
                .to_string(),
        }
    }

    pub fn is_image(&self) -> bool {
        self.mime_type()
            .parse::<mime_guess::Mime>()
            .map(|mime| mime.type_() == mime_guess::mime::IMAGE)
            .unwrap_or(false)
    }
}

/// Form for `POST /api/posts`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewPost {
    pub content: String,
    pub images: Vec<ImageFile>,
}

impl NewPost {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            images: Vec::new(),
        }
    }
}

/// Form for `PUT /api/posts/:id`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostEdit {
    pub content: String,
    /// Image URLs of the post as the editor last saw them
    pub existing_images: Vec<String>,
    /// Indices into `existing_images` to drop
    pub removed_images: Vec<usize>,
    pub new_images: Vec<ImageFile>,
}

impl PostEdit {
    /// Edit of `post` that keeps its images and replaces the content
    pub fn of(post: &Post, content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            existing_images: post.images.clone(),
            removed_images: Vec::new(),
            new_images: Vec::new(),
        }
    }

    pub fn remove_image(mut self, index: usize) -> Self {
        if !self.removed_images.contains(&index) {
            self.removed_images.push(index);
        }
        self
    }

    pub fn add_image(mut self, image: ImageFile) -> Self {
        self.new_images.push(image);
        self
    }

    /// Number of images the post will have once the edit is applied
    pub fn resulting_image_count(&self) -> usize {
        let removed: HashSet<usize> = self
            .removed_images
            .iter()
            .copied()
            .filter(|&index| index < self.existing_images.len())
            .collect();
        self.existing_images.len().saturating_sub(removed.len()) + self.new_images.len()
    }
}

use thiserror::Error;

use connectsphere_types::{MAX_POST_IMAGES, MAX_POST_LENGTH};

use crate::api::{ImageFile, NewPost, PostEdit};

/// Problems caught before a request is sent
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Content cannot be empty")]
    EmptyContent,

    #[error("Content is {length} characters; the limit is {max}")]
    ContentTooLong { length: usize, max: usize },

    #[error("A post can have at most {max} images ({count} selected)")]
    TooManyImages { count: usize, max: usize },

    #[error("'{0}' is not an image")]
    NotAnImage(String),
}

pub fn validate_post_content(content: &str) -> Result<(), ValidationError> {
    if content.trim().is_empty() {
        return Err(ValidationError::EmptyContent);
    }
    let length = content.trim().chars().count();
    if length > MAX_POST_LENGTH {
        return Err(ValidationError::ContentTooLong {
            length,
            max: MAX_POST_LENGTH,
        });
    }
    Ok(())
}

pub fn validate_comment_content(content: &str) -> Result<(), ValidationError> {
    if content.trim().is_empty() {
        return Err(ValidationError::EmptyContent);
    }
    Ok(())
}

fn validate_images(total: usize, uploads: &[ImageFile]) -> Result<(), ValidationError> {
    if total > MAX_POST_IMAGES {
        return Err(ValidationError::TooManyImages {
            count: total,
            max: MAX_POST_IMAGES,
        });
    }
    if let Some(file) = uploads.iter().find(|file| !file.is_image()) {
        return Err(ValidationError::NotAnImage(file.file_name.clone()));
    }
    Ok(())
}

pub fn validate_new_post(post: &NewPost) -> Result<(), ValidationError> {
    validate_post_content(&post.content)?;
    validate_images(post.images.len(), &post.images)
}

pub fn validate_post_edit(edit: &PostEdit) -> Result<(), ValidationError> {
    validate_post_content(&edit.content)?;
    validate_images(edit.resulting_image_count(), &edit.new_images)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn png(name: &str) -> ImageFile {
        ImageFile::new(name, vec![1, 2, 3])
    }

    #[test]
    fn test_post_content() {
        assert_eq!(validate_post_content("  \n"), Err(ValidationError::EmptyContent));
        assert!(validate_post_content(&"é".repeat(MAX_POST_LENGTH)).is_ok());
        assert_eq!(
            validate_post_content(&"a".repeat(MAX_POST_LENGTH + 1)),
            Err(ValidationError::ContentTooLong {
                length: MAX_POST_LENGTH + 1,
                max: MAX_POST_LENGTH
            })
        );
    }

    #[test]
    fn test_comment_content() {
        assert_eq!(validate_comment_content(""), Err(ValidationError::EmptyContent));
        assert!(validate_comment_content(&"a".repeat(1000)).is_ok());
    }

    #[test]
    fn test_new_post_images() {
        let mut post = NewPost::text("hi");
        post.images = (0..4).map(|i| png(&format!("{}.png", i))).collect();
        assert!(validate_new_post(&post).is_ok());

        post.images.push(png("5.png"));
        assert_eq!(
            validate_new_post(&post),
            Err(ValidationError::TooManyImages { count: 5, max: 4 })
        );

        let mut post = NewPost::text("hi");
        post.images.push(ImageFile::new("resume.pdf", vec![]));
        assert_eq!(
            validate_new_post(&post),
            Err(ValidationError::NotAnImage("resume.pdf".into()))
        );
    }

    #[test]
    fn test_edit_counts_kept_images() {
        let edit = PostEdit {
            content: "edit".into(),
            existing_images: vec!["a".into(), "b".into(), "c".into(), "d".into()],
            ..PostEdit::default()
        }
        .add_image(png("e.png"));
        assert!(matches!(
            validate_post_edit(&edit),
            Err(ValidationError::TooManyImages { .. })
        ));
        assert!(validate_post_edit(&edit.remove_image(2)).is_ok());
    }
}

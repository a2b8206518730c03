//! Form payloads posted by browsers.

use axum_extra::extract::{Multipart, multipart::MultipartError};
use serde::Deserialize;

use crate::{
    application::{media::ImageUpload, posts::PostCommand},
    domain::{error::DomainError, types::GroupId},
};

/// The create/edit post form as submitted, before validation.
#[derive(Debug, Default)]
pub(super) struct PostFormInput {
    pub(super) text: String,
    pub(super) group: Option<String>,
    pub(super) image: Option<ImageUpload>,
}

impl PostFormInput {
    /// Raw group selection as an id, for re-rendering the select.
    pub(super) fn group_id(&self) -> Option<i64> {
        self.group.as_deref().and_then(|value| value.parse().ok())
    }

    pub(super) fn into_command(self) -> Result<PostCommand, DomainError> {
        let group_id = match self.group.as_deref() {
            None => None,
            Some(raw) => Some(raw.parse::<GroupId>().map_err(|_| {
                DomainError::validation(
                    "group",
                    "Select a valid choice. That choice is not one of the available choices.",
                )
            })?),
        };

        Ok(PostCommand {
            text: self.text,
            group_id,
            image: self.image,
        })
    }
}

pub(super) async fn read_post_form(
    multipart: &mut Multipart,
) -> Result<PostFormInput, MultipartError> {
    let mut input = PostFormInput::default();

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().map(str::to_owned);
        match name.as_deref() {
            Some("text") => input.text = field.text().await?,
            Some("group") => {
                let value = field.text().await?;
                let value = value.trim();
                input.group = (!value.is_empty()).then(|| value.to_string());
            }
            Some("image") => {
                let file_name = field
                    .file_name()
                    .map(str::to_owned)
                    .filter(|value| !value.trim().is_empty());
                let data = field.bytes().await?;
                // Browsers send an empty part when no file was chosen.
                if let Some(file_name) = file_name
                    && !data.is_empty()
                {
                    input.image = Some(ImageUpload { file_name, data });
                }
            }
            _ => {}
        }
    }

    Ok(input)
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(super) struct CommentForm {
    pub(super) text: String,
}

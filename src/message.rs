use crate::features::upload::UploadMessage;

#[derive(Debug)]
pub enum Message {
    Upload(UploadMessage),
}

pub mod bulk;
pub mod stats;
pub mod status;

pub async fn index() -> &'static str {
    "instance-status service"
}

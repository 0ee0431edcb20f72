#[path = "ApiResponse.rs"]
pub mod api_response;

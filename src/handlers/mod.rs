pub mod leaderboard;

use crate::error::AppError;
use ntex::web::HttpResponse;

pub async fn method_not_allowed() -> Result<HttpResponse, AppError> {
    Err(AppError::MethodNotAllowed)
}

use crate::util::server_request;

pub async fn run(server_url: &str, raw: bool) -> i32 {
    server_request(server_url, reqwest::Method::GET, "health", None, raw).await
}

use std::process::ExitCode;

use memstress::core::domain::PolicyKind;

#[tokio::main]
async fn main() -> ExitCode {
    memstress::cli::main(PolicyKind::NearLimit).await
}

// stdio.rs — Line-oriented JSON-RPC transport.
//
// One JSON object per LF-terminated line on stdin, one reply per line on
// stdout. Strictly sequential: each request is fully handled (including
// any synchronous approval wait) before the next line is read. Logs must
// go to stderr — stdout belongs to the protocol.
//
// There is no authentication on this transport; the caller identity is
// fixed to tenant "local", subject "stdio-client".

use std::sync::Arc;

use serde_json::Value;
use tokio::io::{AsyncBufReadExt as _, AsyncWriteExt as _, BufReader};

use crate::error::{codes, GatewayError};
use crate::rpc::{dispatch, rpc_error, rpc_result, CallerIdentity, RpcRequest};
use crate::state::Gateway;

/// Run the stdio loop until EOF or `shutdown`.
pub async fn run(gw: Arc<Gateway>) -> Result<(), GatewayError> {
    let stdin = BufReader::new(tokio::io::stdin());
    let mut stdout = tokio::io::stdout();
    let mut lines = stdin.lines();
    let caller = CallerIdentity::stdio();

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let req: RpcRequest = match serde_json::from_str(line) {
            Ok(req) => req,
            Err(_) => {
                write_line(
                    &mut stdout,
                    &rpc_error(&Value::Null, codes::PARSE_ERROR, "parse error"),
                )
                .await?;
                continue;
            }
        };

        if req.jsonrpc.as_deref() == Some("2.0") && req.is_shutdown() {
            write_line(
                &mut stdout,
                &rpc_result(&req.id, serde_json::json!({"ok": true})),
            )
            .await?;
            break;
        }

        let response = dispatch(&gw, &caller, &req).await;
        write_line(&mut stdout, &response).await?;
    }

    tracing::info!("stdio transport closed");
    Ok(())
}

async fn write_line(stdout: &mut tokio::io::Stdout, message: &Value) -> std::io::Result<()> {
    let mut bytes = serde_json::to_vec(message)?;
    bytes.push(b'\n');
    stdout.write_all(&bytes).await?;
    stdout.flush().await
}

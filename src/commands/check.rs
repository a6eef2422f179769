use crate::config::SyncSettings;
use crate::storage::{self, RemoteClient};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct CheckConnectionResult {
    pub success: bool,
    pub message: String,
    pub details: Option<String>,
}

/// 测试连接：登录远程存储并进入基准目录，不做任何修改
pub async fn check_connection(settings: &SyncSettings) -> CheckConnectionResult {
    if let Err(e) = settings.validate() {
        return CheckConnectionResult {
            success: false,
            message: "配置不完整".to_string(),
            details: Some(e.to_string()),
        };
    }

    let mut client = match storage::connect(&settings.storage).await {
        Ok(c) => c,
        Err(e) => {
            return CheckConnectionResult {
                success: false,
                message: "连接失败".to_string(),
                details: Some(format!("检查凭证和服务器地址: {:#}", anyhow::Error::from(e))),
            }
        }
    };

    check_with_client(&mut client, &settings.base_remote_dir).await
}

/// 用已建立的会话检查基准目录：能进入并能列出才算成功
pub async fn check_with_client<C: RemoteClient + ?Sized>(
    client: &mut C,
    base_remote_dir: &str,
) -> CheckConnectionResult {
    if let Err(e) = client.change_directory(base_remote_dir).await {
        return CheckConnectionResult {
            success: false,
            message: "远程基准目录不可用".to_string(),
            details: Some(format!("{}: {}", base_remote_dir, e)),
        };
    }

    match client.list_entries().await {
        Ok(names) => CheckConnectionResult {
            success: true,
            message: "连接成功".to_string(),
            details: Some(format!(
                "{}:{} ({} 个条目)",
                client.name(),
                client.current_dir(),
                names.len()
            )),
        },
        Err(e) => CheckConnectionResult {
            success: false,
            message: "无法列出远程基准目录".to_string(),
            details: Some(format!("{}: {:#}", base_remote_dir, anyhow::Error::from(e))),
        },
    }
}

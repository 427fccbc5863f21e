// ABOUTME: Integration tests for the Docker provider against a real daemon
// ABOUTME: Skipped when Docker is unavailable; verifies graceful degradation otherwise

use futures::StreamExt;
use std::collections::HashMap;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use wharf_sandbox::{ContainerConfig, ContainerStatus, DockerProvider, Provider, ProviderError};

const TEST_IMAGE: &str = "alpine:latest";

async fn docker() -> Option<DockerProvider> {
    let provider = DockerProvider::new().ok()?;
    match provider.is_available().await {
        Ok(true) => Some(provider),
        _ => None,
    }
}

fn sleeper(name: &str) -> ContainerConfig {
    ContainerConfig {
        image: TEST_IMAGE.to_string(),
        name: name.to_string(),
        command: Some(vec!["sleep".to_string(), "300".to_string()]),
        labels: HashMap::from([("wharf.test".to_string(), "true".to_string())]),
        auto_remove: true,
        ..Default::default()
    }
}

/// DockerProvider::new() either connects or fails with an informative error
#[tokio::test]
async fn test_docker_provider_unavailable_error() {
    match DockerProvider::new() {
        Ok(_) => println!("Note: Docker is available, unavailability path not exercised"),
        Err(e) => {
            let msg = e.to_string();
            assert!(
                msg.contains("Connection") || msg.contains("Docker") || msg.contains("socket"),
                "Error message should describe the connection failure: {}",
                msg
            );
        }
    }
}

#[tokio::test]
async fn test_inspect_missing_container_is_not_found() {
    let Some(provider) = docker().await else {
        println!("Skipping test: Docker not available");
        return;
    };

    let result = provider
        .get_container_info("wharf-definitely-not-a-container")
        .await;
    assert!(matches!(result, Err(ProviderError::NotFound(_))));
}

#[tokio::test]
async fn test_container_exec_and_shell() {
    let Some(provider) = docker().await else {
        println!("Skipping test: Docker not available");
        return;
    };

    if !provider.image_exists(TEST_IMAGE).await.unwrap() {
        provider.pull_image(TEST_IMAGE).await.unwrap();
    }

    let name = format!("wharf-it-{}", std::process::id());
    let _ = provider.remove_container(&name, true).await;
    let id = provider.create_container(&sleeper(&name)).await.unwrap();
    provider.start_container(&id).await.unwrap();

    let info = provider.get_container_info(&name).await.unwrap();
    assert_eq!(info.status, ContainerStatus::Running);

    let result = provider
        .exec_command(
            &id,
            vec!["sh".into(), "-c".into(), "echo out; echo err >&2; exit 3".into()],
            None,
        )
        .await
        .unwrap();
    assert_eq!(result.exit_code, 3);
    let text = result.output_text();
    assert!(text.contains("out"));
    assert!(text.contains("err"));

    let mut shell = provider
        .attach_shell(&id, vec!["/bin/sh".into()])
        .await
        .unwrap();
    shell.input.write_all(b"echo wharf-echo\n").await.unwrap();
    shell.input.write_all(b"exit\n").await.unwrap();

    let mut collected = Vec::new();
    let _ = tokio::time::timeout(Duration::from_secs(10), async {
        while let Some(chunk) = shell.output.next().await {
            collected.extend(chunk.unwrap());
        }
    })
    .await;
    assert!(String::from_utf8_lossy(&collected).contains("wharf-echo"));

    provider.stop_container(&id, 1).await.unwrap();
    // Already stopped is not an error
    let _ = provider.stop_container(&id, 1).await;
}

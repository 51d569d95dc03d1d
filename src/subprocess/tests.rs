#[cfg(test)]
mod tests {
    use super::super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_production_runner_success() {
        let runner = runner::TokioProcessRunner;
        let command = ProcessCommandBuilder::new("echo")
            .arg("hello world")
            .build();

        let output = runner.run(command).await.unwrap();
        assert!(output.status.success());
        assert_eq!(output.stdout.trim(), "hello world");
        assert!(output.stderr.is_empty());
    }

    #[tokio::test]
    async fn test_production_runner_failure() {
        let runner = runner::TokioProcessRunner;
        let command = ProcessCommandBuilder::new("false").build();

        let output = runner.run(command).await.unwrap();
        assert!(!output.status.success());
        assert_eq!(output.status, ExitStatus::Error(1));
    }

    #[tokio::test]
    async fn test_production_runner_captures_stderr() {
        let runner = runner::TokioProcessRunner;
        let command = ProcessCommandBuilder::new("sh")
            .args(["-c", "echo out; echo err >&2; exit 3"])
            .build();

        let output = runner.run(command).await.unwrap();
        assert_eq!(output.status, ExitStatus::Error(3));
        assert_eq!(output.combined(), "out\nerr\n");
    }

    #[tokio::test]
    async fn test_production_runner_command_not_found() {
        let runner = runner::TokioProcessRunner;
        let command = ProcessCommandBuilder::new("nonexistent-command-12345").build();

        let result = runner.run(command).await;
        assert!(matches!(result, Err(ProcessError::CommandNotFound(_))));
    }

    #[tokio::test]
    async fn test_production_runner_timeout() {
        let runner = runner::TokioProcessRunner;
        let command = ProcessCommandBuilder::new("sleep")
            .arg("5")
            .timeout(Some(Duration::from_millis(100)))
            .build();

        let result = runner.run(command).await;
        assert!(matches!(result, Err(ProcessError::Timeout(_))));
    }

    #[tokio::test]
    async fn test_mock_runner_multiple_calls() {
        let mock = MockProcessRunner::new();

        mock.expect("dcmdump")
            .when(|args| args.first().map(String::as_str) == Some("-q"))
            .stdout("(0010,0020) LO [P001]  #   4, 1 PatientID\n")
            .times(2)
            .register();

        for _ in 0..2 {
            let output = mock
                .run(ProcessCommandBuilder::new("dcmdump").args(["-q", "f.dcm"]).build())
                .await
                .unwrap();
            assert!(output.stdout.contains("PatientID"));
        }

        let third = mock
            .run(ProcessCommandBuilder::new("dcmdump").args(["-q", "f.dcm"]).build())
            .await;
        assert!(matches!(third, Err(ProcessError::MockExpectationNotMet(_))));
        assert_eq!(mock.call_count("dcmdump"), 3);
    }

    #[tokio::test]
    async fn test_subprocess_manager_converter_uses_shared_runner() {
        let (manager, mock) = SubprocessManager::mock();
        mock.expect("dcm2niix").exit_code(0).register();

        let converter = manager.converter("dcm2niix");
        assert!(converter.check_availability().await.unwrap());
        assert_eq!(mock.calls()[0].args, vec!["-v"]);
    }
}

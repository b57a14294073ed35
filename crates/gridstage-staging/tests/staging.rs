use std::fs;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use gridstage_config::DigestAlgorithm;
use gridstage_staging::{
    CommandPlacementOracle, ContentStager, OracleError, PathResolver, StageOutcome, StagingError,
    digest_for, filename_for,
};
use gridstage_telemetry::Metrics;
use gridstage_test_support::fixtures::ProjectFixture;
use gridstage_test_support::mocks::{CollidingDigest, FixedOutputOracle, HashedPlacementOracle};

fn hashed_stager(project: &ProjectFixture) -> (ContentStager, Arc<HashedPlacementOracle>) {
    let oracle = Arc::new(HashedPlacementOracle::new(project.download_dir()));
    let stager = ContentStager::from_config(&project.config(), oracle.clone());
    (stager, oracle)
}

#[tokio::test]
async fn staging_twice_writes_once_and_returns_same_path() -> Result<()> {
    let project = ProjectFixture::new()?;
    let (stager, _) = hashed_stager(&project);

    let first = stager.stage_detailed("input", b"seed bytes").await?;
    let modified = fs::metadata(&first.path)?.modified()?;
    let second = stager.stage_detailed("input", b"seed bytes").await?;

    assert_eq!(first.path, second.path);
    assert_eq!(first.outcome, StageOutcome::Created);
    assert_eq!(second.outcome, StageOutcome::AlreadyPresent);
    assert_eq!(fs::metadata(&second.path)?.modified()?, modified);
    assert_eq!(fs::read(&second.path)?, b"seed bytes");
    Ok(())
}

#[tokio::test]
async fn staged_name_round_trips_through_digest() -> Result<()> {
    let project = ProjectFixture::new()?;
    let (stager, oracle) = hashed_stager(&project);

    let content = b"--steps 400";
    let path = stager.stage("cmdline", content).await?;
    let expected = filename_for("cmdline", &digest_for(DigestAlgorithm::Sha256).hex_digest(content));

    assert_eq!(path.file_name().and_then(|name| name.to_str()), Some(expected.as_str()));
    assert_eq!(path, oracle.expected_path(&expected));
    assert_eq!(stager.locate("cmdline", &expected["cmdline_".len()..]).await?, path);
    Ok(())
}

#[tokio::test]
async fn distinct_prefixes_never_share_a_file() -> Result<()> {
    let project = ProjectFixture::new()?;
    let (stager, _) = hashed_stager(&project);

    let seed = stager.stage("input", b"same").await?;
    let cmdline = stager.stage("cmdline", b"same").await?;
    assert_ne!(seed, cmdline);
    Ok(())
}

#[tokio::test]
async fn colliding_content_is_a_consistency_error() -> Result<()> {
    let project = ProjectFixture::new()?;
    let oracle = Arc::new(HashedPlacementOracle::new(project.download_dir()));
    let stager = ContentStager::new(
        PathResolver::new(oracle),
        Arc::new(CollidingDigest::new("abcd")),
    );

    let path = stager.stage("input", b"original").await?;
    let err = stager
        .stage("input", b"impostor")
        .await
        .expect_err("collision must be detected");

    match err {
        StagingError::Consistency { filename, path: conflict } => {
            assert_eq!(filename, "input_abcd");
            assert_eq!(conflict, path);
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(fs::read(&path)?, b"original");
    Ok(())
}

#[tokio::test]
async fn concurrent_stagers_create_exactly_once() -> Result<()> {
    let project = ProjectFixture::new()?;
    let (stager, _) = hashed_stager(&project);
    let metrics = Metrics::new()?;
    let stager = stager.with_metrics(metrics.clone());

    let mut handles = Vec::new();
    for _ in 0..8 {
        let stager = stager.clone();
        handles.push(tokio::spawn(async move {
            stager.stage_detailed("input", b"shared seed").await
        }));
    }

    let mut created = 0;
    let mut paths = Vec::new();
    for handle in handles {
        let staged = handle.await??;
        if staged.outcome == StageOutcome::Created {
            created += 1;
        }
        paths.push(staged.path);
    }

    assert_eq!(created, 1);
    assert!(paths.windows(2).all(|pair| pair[0] == pair[1]));
    let snapshot = metrics.snapshot();
    assert_eq!(snapshot.staged_created, 1);
    assert_eq!(snapshot.staged_reused, 7);

    let parent = paths[0].parent().expect("staged path has a parent");
    let leftovers: Vec<_> = fs::read_dir(parent)?
        .filter_map(Result::ok)
        .filter(|entry| entry.file_name().to_string_lossy().starts_with(".gridstage-"))
        .collect();
    assert!(leftovers.is_empty());
    Ok(())
}

#[tokio::test]
async fn download_path_is_relative_to_marker() -> Result<()> {
    let project = ProjectFixture::new()?;
    let oracle = Arc::new(HashedPlacementOracle::with_fanout(project.download_dir(), 4));
    let resolver = PathResolver::new(oracle.clone());

    let relative = resolver.download_path("input_ff").await?;
    let absolute = oracle.expected_path("input_ff");
    assert!(absolute.to_string_lossy().ends_with(&relative));
    assert!(relative.ends_with("/input_ff"));
    assert!(!relative.contains("download"));
    Ok(())
}

#[tokio::test]
async fn malformed_oracle_output_fails_staging() -> Result<()> {
    let project = ProjectFixture::new()?;
    let oracle = Arc::new(FixedOutputOracle::new("relative/path\n"));
    let stager = ContentStager::from_config(&project.config(), oracle);

    let err = stager
        .stage("input", b"data")
        .await
        .expect_err("relative oracle output must be rejected");
    assert!(matches!(err, StagingError::Oracle(OracleError::Malformed { .. })));
    Ok(())
}

#[cfg(unix)]
mod command_oracle {
    use super::*;

    #[tokio::test]
    async fn shell_oracle_places_files_under_download() -> Result<()> {
        let project = ProjectFixture::new()?;
        let download = project.download_dir();
        let script = project.write_script(
            "dir_hier_path",
            &format!(
                "mkdir -p {dir}/1a && echo {dir}/1a/\"$1\"",
                dir = download.display()
            ),
        )?;
        let oracle = Arc::new(CommandPlacementOracle::new(
            script,
            project.root(),
            Duration::from_secs(10),
        ));
        let stager = ContentStager::from_config(&project.config(), oracle);

        let staged = stager.stage_detailed("input", b"payload").await?;
        assert_eq!(staged.path, download.join("1a").join(&staged.filename));
        assert_eq!(
            stager.resolver().to_relative(&staged.path),
            format!("1a/{}", staged.filename)
        );
        Ok(())
    }

    #[tokio::test]
    async fn failing_oracle_surfaces_its_output() -> Result<()> {
        let project = ProjectFixture::new()?;
        let script = project.write_script("dir_hier_path", "echo 'no fanout config' >&2; exit 3")?;
        let oracle = CommandPlacementOracle::new(script, project.root(), Duration::from_secs(10));
        let resolver = PathResolver::new(Arc::new(oracle));

        match resolver.resolve("input_00").await {
            Err(OracleError::Failed { status, output, .. }) => {
                assert_eq!(status, Some(3));
                assert!(output.contains("no fanout config"));
            }
            other => panic!("unexpected result: {other:?}"),
        }
        Ok(())
    }

    #[tokio::test]
    async fn hung_oracle_times_out() -> Result<()> {
        let project = ProjectFixture::new()?;
        let script = project.write_script("dir_hier_path", "sleep 30")?;
        let oracle =
            CommandPlacementOracle::new(script, project.root(), Duration::from_millis(200));
        let resolver = PathResolver::new(Arc::new(oracle));

        let err = resolver
            .resolve("input_00")
            .await
            .expect_err("oracle should time out");
        assert!(matches!(err, OracleError::TimedOut { .. }));
        Ok(())
    }

    #[tokio::test]
    async fn multi_line_oracle_output_is_rejected() -> Result<()> {
        let project = ProjectFixture::new()?;
        let script = project.write_script("dir_hier_path", "echo /a/download/x; echo /b/download/y")?;
        let oracle = CommandPlacementOracle::new(script, project.root(), Duration::from_secs(10));
        let resolver = PathResolver::new(Arc::new(oracle));

        let err = resolver
            .resolve("input_00")
            .await
            .expect_err("two lines are ambiguous");
        assert!(matches!(err, OracleError::Malformed { .. }));
        Ok(())
    }
}

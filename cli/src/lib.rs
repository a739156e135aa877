use std::io::Write;

use async_compression::tokio::bufread::GzipDecoder;
use fotree_source::persist::{SourcePersister, SourceStore};
use fotree_source::{Child, InvocationConfig, Source, SourceFactory, Unit};
use futures::future::LocalBoxFuture;
use futures::FutureExt;
use tokio::io::BufReader;
use tracing::{info, instrument, Span};
use tracing_indicatif::span_ext::IndicatifSpanExt;

pub mod args;
mod errors;

pub use errors::Error;

/// Builds the source tree for `names`, writes it to `out`, and removes all
/// temp files created along the way.
#[instrument(skip_all, fields(indicatif.pb_show=1), err)]
pub async fn characterize<W: Write>(
    names: &[String],
    persister_addr: &str,
    expand: bool,
    config: &InvocationConfig,
    out: &mut W,
) -> Result<(), Error> {
    let span = Span::current();
    span.pb_start();
    span.pb_set_message("Building source tree…");

    let persister = fotree_source::persist::from_addr(persister_addr).await?;
    let store = persister.store();
    let factory = SourceFactory::new(persister);

    let result = async {
        let mut root = factory.source_for_names(names, config).await?;

        if expand {
            span.pb_set_message("Expanding archives…");
            expand_archives(&factory, &mut root, config).await?;
        }

        render(&root, store.as_deref(), 0, out).await?;
        root.close(factory.temp_resources()).await?;

        Ok::<_, Error>(())
    }
    .await;

    let swept = factory.temp_resources().sweep().await?;
    info!(swept, "removed remaining temp files");

    result
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tarball {
    Plain,
    Gzip,
}

fn tarball_kind(name: &str) -> Option<Tarball> {
    let name = name.to_ascii_lowercase();
    if name.ends_with(".tar") {
        Some(Tarball::Plain)
    } else if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
        Some(Tarball::Gzip)
    } else {
        None
    }
}

/// Expands every tarball among the live units below (and including)
/// `source` into its members. Units already spilled to a store are left
/// alone.
pub fn expand_archives<'a, P>(
    factory: &'a SourceFactory<P>,
    source: &'a mut Source,
    config: &'a InvocationConfig,
) -> LocalBoxFuture<'a, Result<(), Error>>
where
    P: SourcePersister,
{
    async move {
        let kind = source.name().and_then(tarball_kind);
        if let (Some(kind), Some(_)) = (kind, source.content_len()) {
            let reader = source.input().open().await?;
            match kind {
                Tarball::Plain => factory.expand_tar(source, reader, config).await?,
                Tarball::Gzip => {
                    let reader = GzipDecoder::new(BufReader::new(reader));
                    factory.expand_tar(source, reader, config).await?
                }
            }
        }

        for child in source.live_children_mut() {
            expand_archives(factory, child, config).await?;
        }

        Ok(())
    }
    .boxed_local()
}

/// A single line describing `source`.
pub fn describe(source: &Source) -> String {
    let mut line = source.kind().to_string();

    if let Some(name) = source.name() {
        line.push(' ');
        line.push_str(name);
    }

    if let Some(measurable) = source.as_measurable() {
        line.push_str(&format!(
            " [{}..{})",
            measurable.starting_offset(),
            measurable.ending_offset()
        ));
    } else if let Some(len) = source.content_len() {
        line.push_str(&format!(" size={}", len));
    }

    match source {
        Source::File(file) if !file.metadata().exists() => line.push_str(" missing"),
        Source::Directory(directory) if directory.is_virtual() => line.push_str(" virtual"),
        _ => {}
    }

    if source.is_ephemeral() {
        line.push_str(" ephemeral");
        if !source.delete_on_close() {
            line.push_str(" retained");
        }
    }

    line
}

/// Writes one line per unit of the tree below `source`, indented by depth.
/// Stored children are loaded from `store`. Without a store, only their
/// stub is printed.
pub fn render<'a, W: Write>(
    source: &'a Source,
    store: Option<&'a dyn SourceStore>,
    depth: usize,
    out: &'a mut W,
) -> LocalBoxFuture<'a, Result<(), Error>> {
    async move {
        writeln!(out, "{}{}", "  ".repeat(depth), describe(source))?;

        for child in source.children() {
            match child {
                Child::Live(child) => render(child, store, depth + 1, out).await?,
                Child::Stored(stub) => match store {
                    Some(store) => {
                        let loaded = stub.load(store).await?;
                        render(&loaded, Some(store), depth + 1, out).await?;
                    }
                    None => writeln!(
                        out,
                        "{}{} {} (stored {})",
                        "  ".repeat(depth + 1),
                        stub.kind(),
                        stub.name().unwrap_or("-"),
                        stub.key()
                    )?,
                },
            }
        }

        Ok(())
    }
    .boxed_local()
}

#[cfg(test)]
mod tests {
    use fotree_source::fixtures::{tar_archive, TarMember, HELLOWORLD_BLOB_CONTENTS};
    use fotree_source::InvocationConfig;
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use tempfile::TempDir;

    use super::{characterize, tarball_kind, Tarball};

    #[rstest]
    #[case::tar("foo.tar", Some(Tarball::Plain))]
    #[case::tar_gz("foo.tar.gz", Some(Tarball::Gzip))]
    #[case::tgz("FOO.TGZ", Some(Tarball::Gzip))]
    #[case::zip("foo.zip", None)]
    fn test_tarball_kind(#[case] name: &str, #[case] exp: Option<Tarball>) {
        assert_eq!(exp, tarball_kind(name));
    }

    #[rstest]
    #[case::passthrough("passthrough://")]
    #[case::memory("memory://")]
    #[case::redb("redb://")]
    #[tokio::test]
    async fn directory_tree(#[case] persister: &str) {
        let tmpdir = TempDir::new().unwrap();
        let root = tmpdir.path().join("root");
        std::fs::create_dir_all(root.join("sub")).unwrap();
        std::fs::write(root.join("sub").join("b"), "hello").unwrap();

        let mut out = Vec::new();
        characterize(
            &[root.to_str().unwrap().to_string()],
            persister,
            false,
            &InvocationConfig::default().with_temp_dir(tmpdir.path()),
            &mut out,
        )
        .await
        .expect("must succeed");

        assert_eq!(
            "directory root\n  directory sub\n    file b size=5\n",
            String::from_utf8(out).unwrap()
        );
    }

    #[tokio::test]
    async fn expanded_tarball() {
        let tmpdir = TempDir::new().unwrap();
        let tempdir = TempDir::new().unwrap();
        let tarball = tar_archive(&[TarMember::File("inner.txt", HELLOWORLD_BLOB_CONTENTS)])
            .await
            .unwrap();
        let path = tmpdir.path().join("bundle.tar");
        std::fs::write(&path, &tarball).unwrap();

        let mut out = Vec::new();
        characterize(
            &[path.to_str().unwrap().to_string()],
            "passthrough://",
            true,
            &InvocationConfig::default().with_temp_dir(tempdir.path()),
            &mut out,
        )
        .await
        .expect("must succeed");

        assert_eq!(
            format!(
                "file bundle.tar size={}\n  archive file inner.txt size=12 ephemeral retained\n",
                tarball.len()
            ),
            String::from_utf8(out).unwrap()
        );
        assert_eq!(
            0,
            std::fs::read_dir(tempdir.path()).unwrap().count(),
            "temp files are swept"
        );
    }

    #[tokio::test]
    async fn missing_name() {
        let tmpdir = TempDir::new().unwrap();

        let mut out = Vec::new();
        let res = characterize(
            &[tmpdir.path().join("missing").to_str().unwrap().to_string()],
            "passthrough://",
            false,
            &InvocationConfig::default().with_temp_dir(tmpdir.path()),
            &mut out,
        )
        .await;

        assert!(matches!(
            res,
            Err(crate::Error::Source(fotree_source::Error::NotFound(_)))
        ));
        assert!(out.is_empty());
    }
}

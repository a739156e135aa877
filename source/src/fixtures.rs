use std::io;

use tokio_tar::{Builder, EntryType, Header};

pub const HELLOWORLD_BLOB_CONTENTS: &[u8] = b"Hello World!";
pub const EMPTY_BLOB_CONTENTS: &[u8] = b"";

// 1MB
pub const BLOB_B_LEN: usize = 255 * 4 * 1024;

pub fn blob_b() -> Vec<u8> {
    (0..255).collect::<Vec<u8>>().repeat(4 * 1024)
}

/// A member of a tarball built by [tar_archive].
#[derive(Debug, Clone, Copy)]
pub enum TarMember<'a> {
    Dir(&'a str),
    File(&'a str, &'a [u8]),
}

/// Builds an uncompressed tarball containing `members`, in order.
pub async fn tar_archive(members: &[TarMember<'_>]) -> io::Result<Vec<u8>> {
    let mut builder = Builder::new(Vec::new());

    for member in members {
        let mut header = Header::new_gnu();
        header.set_mtime(1_600_000_000);

        match member {
            TarMember::Dir(path) => {
                header.set_entry_type(EntryType::Directory);
                header.set_mode(0o755);
                header.set_size(0);
                builder.append_data(&mut header, path, EMPTY_BLOB_CONTENTS).await?;
            }
            TarMember::File(path, contents) => {
                header.set_entry_type(EntryType::Regular);
                header.set_mode(0o644);
                header.set_size(contents.len() as u64);
                builder.append_data(&mut header, path, *contents).await?;
            }
        }
    }

    builder.into_inner().await
}

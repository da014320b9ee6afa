/*!
 * Descriptor Table Demo
 *
 * Walks a simulated process through the table lifecycle:
 * - std stream bootstrap from inherited handles
 * - dup2 onto a high descriptor with close-on-exec set
 * - exec into a child image and the post-exec fixup
 */

use anyhow::Context;
use posix_dtable::{
    init_tracing, Dtable, DtableConfig, Host, MountTableResolver, ObjectKind, SimulatedHost, StdStream,
};
use std::sync::Arc;
use tracing::info;

fn main() -> anyhow::Result<()> {
    init_tracing();
    info!("descriptor table demo starting");

    let host = SimulatedHost::new();
    let conin = host.open(ObjectKind::ConsoleInput, None);
    let conout = host.open(ObjectKind::ConsoleOutput, None);
    let pipe = host.open(ObjectKind::Pipe, None);
    host.set_std_handle(StdStream::Input, Some(conin));
    host.set_std_handle(StdStream::Output, Some(conout));
    host.set_std_handle(StdStream::Error, Some(pipe));

    let resolver = Arc::new(MountTableResolver::with_root("C:\\cygwin"));
    let parent = host.pid();
    let table = Dtable::new(Arc::new(host.clone()), resolver, DtableConfig::from_env())
        .context("creating descriptor table")?;

    table.stdio_init().context("bootstrapping std streams")?;
    table.dup2(1, 10).context("dup2(1, 10)")?;
    table
        .set_close_on_exec(10, true)
        .context("marking descriptor 10 close-on-exec")?;
    println!("{}", serde_json::to_string_pretty(&table.snapshot())?);

    let child = host.spawn_suspended();
    table
        .fixup_before_exec(child.pid())
        .context("preparing descriptors for exec")?;
    host.resume_child(&child);
    let image = table.fork_image(Arc::new(child));
    image
        .fixup_after_exec(parent)
        .context("fixing up descriptors after exec")?;
    println!("{}", serde_json::to_string_pretty(&image.snapshot())?);

    info!(
        parent = table.snapshot().open_fds().len(),
        child = image.snapshot().open_fds().len(),
        "demo complete"
    );
    Ok(())
}

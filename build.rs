use vergen_gitcl::{Emitter, GitclBuilder};

fn emit_git_info() -> anyhow::Result<()> {
    let gitcl = GitclBuilder::default().sha(true).branch(true).build()?;
    Emitter::default().add_instructions(&gitcl)?.emit()?;
    Ok(())
}

fn main() {
    // Fails outside of a git checkout, e.g. when installing via cargo.
    // The version string then just omits the revision.
    let _ = emit_git_info();
}

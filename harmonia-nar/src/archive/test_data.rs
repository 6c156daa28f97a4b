use harmonia_utils_io::wire;

use crate::ByteString;

use super::NarNode;

/// Encode each string as a padded wire token.
pub fn token(xs: &[&str]) -> Vec<u8> {
    let mut out = Vec::new();
    for x in xs {
        wire::write_bytes(&mut out, x.as_bytes()).unwrap();
    }
    out
}

#[derive(Debug, Clone)]
pub struct TestNar {
    pub node: NarNode,
    pub nar: Vec<u8>,
}

fn file(executable: bool, contents: &'static str) -> NarNode {
    NarNode::File {
        executable,
        contents: ByteString::from_static(contents.as_bytes()),
    }
}

fn symlink_node(target: &'static str) -> NarNode {
    NarNode::Symlink {
        target: ByteString::from_static(target.as_bytes()),
    }
}

fn dir(entries: Vec<(&'static str, NarNode)>) -> NarNode {
    NarNode::Directory {
        entries: entries
            .into_iter()
            .map(|(name, node)| (ByteString::from_static(name.as_bytes()), node))
            .collect(),
    }
}

pub fn text_file() -> TestNar {
    TestNar {
        node: file(false, "Hello world!\n"),
        nar: token(&[
            "nix-archive-1",
            "(",
            "type",
            "regular",
            "contents",
            "Hello world!\n",
            ")",
        ]),
    }
}

pub fn exec_file() -> TestNar {
    TestNar {
        node: file(true, "#!/bin/sh\n"),
        nar: token(&[
            "nix-archive-1",
            "(",
            "type",
            "regular",
            "executable",
            "",
            "contents",
            "#!/bin/sh\n",
            ")",
        ]),
    }
}

pub fn empty_file() -> TestNar {
    TestNar {
        node: file(false, ""),
        nar: token(&["nix-archive-1", "(", "type", "regular", "contents", "", ")"]),
    }
}

pub fn empty_file_in_dir() -> TestNar {
    TestNar {
        node: dir(vec![("empty", file(false, ""))]),
        nar: token(&[
            "nix-archive-1",
            "(",
            "type",
            "directory",
            "entry",
            "(",
            "name",
            "empty",
            "node",
            "(",
            "type",
            "regular",
            "contents",
            "",
            ")",
            ")",
            ")",
        ]),
    }
}

pub fn empty_dir() -> TestNar {
    TestNar {
        node: dir(vec![]),
        nar: token(&["nix-archive-1", "(", "type", "directory", ")"]),
    }
}

pub fn empty_dir_in_dir() -> TestNar {
    TestNar {
        node: dir(vec![("empty", dir(vec![]))]),
        nar: token(&[
            "nix-archive-1",
            "(",
            "type",
            "directory",
            "entry",
            "(",
            "name",
            "empty",
            "node",
            "(",
            "type",
            "directory",
            ")",
            ")",
            ")",
        ]),
    }
}

pub fn symlink() -> TestNar {
    TestNar {
        node: symlink_node("../deep/target"),
        nar: token(&[
            "nix-archive-1",
            "(",
            "type",
            "symlink",
            "target",
            "../deep/target",
            ")",
        ]),
    }
}

pub fn dir_example() -> TestNar {
    TestNar {
        node: dir(vec![
            ("exec", file(true, "#!/bin/sh\n")),
            ("link", symlink_node("text")),
            ("text", file(false, "Hello world!\n")),
        ]),
        nar: token(&[
            "nix-archive-1",
            "(",
            "type",
            "directory",
            "entry",
            "(",
            "name",
            "exec",
            "node",
            "(",
            "type",
            "regular",
            "executable",
            "",
            "contents",
            "#!/bin/sh\n",
            ")",
            ")",
            "entry",
            "(",
            "name",
            "link",
            "node",
            "(",
            "type",
            "symlink",
            "target",
            "text",
            ")",
            ")",
            "entry",
            "(",
            "name",
            "text",
            "node",
            "(",
            "type",
            "regular",
            "contents",
            "Hello world!\n",
            ")",
            ")",
            ")",
        ]),
    }
}

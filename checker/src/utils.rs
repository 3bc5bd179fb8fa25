// Copyright (c) Facebook, Inc. and its affiliates.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

use log_derive::logfn;
use std::path::{Component, Path};

/// Returns true if `reported`, a file name as it appears in engine output, names the fixture
/// at `fixture`. Engines frequently report absolute paths, or paths relative to some other
/// directory, so the two match if either is a component-wise suffix of the other.
#[logfn(TRACE)]
pub fn refers_to_same_file(fixture: &str, reported: &str) -> bool {
    let fixture = normal_components(fixture);
    let reported = normal_components(reported);
    if fixture.is_empty() || reported.is_empty() {
        return false;
    }
    fixture.ends_with(&reported) || reported.ends_with(&fixture)
}

/// The path's components without `.` and root or prefix components.
fn normal_components(path: &str) -> Vec<&str> {
    let path = Path::new(path);
    path.components()
        .filter_map(|c| match c {
            Component::Normal(name) => name.to_str(),
            Component::ParentDir => Some(".."),
            _ => None,
        })
        .collect()
}

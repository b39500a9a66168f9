//! Shader and program sources.

use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::roots::AssetRoots;

/// Where a backend keeps its shaders: `shaders/<dir>/<name>.<ext>`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ShaderProfile {
    pub dir: &'static str,
    pub ext: &'static str,
}

impl ShaderProfile {
    /// Precompiled GLSL blobs.
    pub const GLSL: ShaderProfile = ShaderProfile { dir: "glsl", ext: "bin" };
    /// WGSL source text.
    pub const WGSL: ShaderProfile = ShaderProfile { dir: "wgsl", ext: "wgsl" };

    pub fn path(&self, name: &str) -> PathBuf {
        PathBuf::from("shaders")
            .join(self.dir)
            .join(format!("{name}.{}", self.ext))
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ShaderData {
    pub name: String,
    pub code: Vec<u8>,
}

impl ShaderData {
    /// Source as UTF-8 text, for textual profiles.
    pub fn as_text(&self) -> Result<&str> {
        std::str::from_utf8(&self.code)
            .with_context(|| format!("Shader '{}' is not valid UTF-8", self.name))
    }
}

/// Vertex + fragment pair.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProgramData {
    pub vertex: ShaderData,
    pub fragment: ShaderData,
}

pub fn load_shader(roots: &AssetRoots, profile: ShaderProfile, name: &str) -> Result<ShaderData> {
    let code = roots
        .read(profile.path(name))
        .with_context(|| format!("Failed to load shader '{name}'"))?;
    log::info!("Loaded shader '{}' ({} bytes)", name, code.len());
    Ok(ShaderData {
        name: name.to_owned(),
        code,
    })
}

pub fn load_program(
    roots: &AssetRoots,
    profile: ShaderProfile,
    vs: &str,
    fs: &str,
) -> Result<ProgramData> {
    Ok(ProgramData {
        vertex: load_shader(roots, profile, vs)?,
        fragment: load_shader(roots, profile, fs)?,
    })
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;
    use crate::roots::tests::scratch_dir;

    #[test]
    fn program_loads_both_stages() {
        let root = scratch_dir("shaders");
        let dir = root.join("shaders/wgsl");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("vs_mesh.wgsl"), "// vs").unwrap();
        fs::write(dir.join("fs_mesh.wgsl"), "// fs").unwrap();

        let roots = AssetRoots::new([&root]);
        let prog = load_program(&roots, ShaderProfile::WGSL, "vs_mesh", "fs_mesh").unwrap();
        assert_eq!(prog.vertex.as_text().unwrap(), "// vs");
        assert_eq!(prog.fragment.name, "fs_mesh");
    }

    #[test]
    fn glsl_profile_path() {
        assert_eq!(
            ShaderProfile::GLSL.path("vs_bump"),
            PathBuf::from("shaders/glsl/vs_bump.bin")
        );
    }

    #[test]
    fn missing_fragment_fails() {
        let root = scratch_dir("shaders-missing");
        let dir = root.join("shaders/wgsl");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("vs_only.wgsl"), "// vs").unwrap();
        let roots = AssetRoots::new([&root]);
        assert!(load_program(&roots, ShaderProfile::WGSL, "vs_only", "fs_none").is_err());
    }
}

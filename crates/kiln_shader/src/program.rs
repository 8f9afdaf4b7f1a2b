//! Shader Program
//!
//! Bundles the byte code handles that make up one pipeline: vertex, pixel and
//! an optional geometry stage. Members are held by `Arc`, so a program never
//! borrows from a cache it does not own.

use std::sync::Arc;

use kiln_assets::{AssetState, DepValPtr, DependencyToken};

use crate::byte_code::CompiledShaderByteCode;
use crate::errors::{Result, ShaderError};
use crate::res_id::ShaderStage;
use crate::service::ShaderService;

#[derive(Debug)]
pub struct ShaderProgram {
    vertex: Arc<CompiledShaderByteCode>,
    pixel: Arc<CompiledShaderByteCode>,
    geometry: Option<Arc<CompiledShaderByteCode>>,
    dep_val: DepValPtr,
}

impl ShaderProgram {
    /// Dispatches vertex and pixel compiles sharing one defines table.
    pub fn new(
        service: &ShaderService,
        vertex_initializer: &str,
        pixel_initializer: &str,
        defines: &str,
    ) -> Result<Self> {
        Self::from_byte_code(
            Arc::new(CompiledShaderByteCode::new(service, vertex_initializer, defines)),
            Arc::new(CompiledShaderByteCode::new(service, pixel_initializer, defines)),
            None,
        )
    }

    /// Same as [`new`](Self::new) with an additional geometry stage.
    pub fn with_geometry(
        service: &ShaderService,
        vertex_initializer: &str,
        geometry_initializer: &str,
        pixel_initializer: &str,
        defines: &str,
    ) -> Result<Self> {
        Self::from_byte_code(
            Arc::new(CompiledShaderByteCode::new(service, vertex_initializer, defines)),
            Arc::new(CompiledShaderByteCode::new(service, pixel_initializer, defines)),
            Some(Arc::new(CompiledShaderByteCode::new(
                service,
                geometry_initializer,
                defines,
            ))),
        )
    }

    /// Assembles a program from existing handles.
    ///
    /// Fails with [`ShaderError::StageMismatch`] if a handle's stage does not
    /// match its slot. Handles whose stage is unknown (rejected before
    /// dispatch) are accepted and surface as `Invalid`.
    pub fn from_byte_code(
        vertex: Arc<CompiledShaderByteCode>,
        pixel: Arc<CompiledShaderByteCode>,
        geometry: Option<Arc<CompiledShaderByteCode>>,
    ) -> Result<Self> {
        check_stage(&vertex, ShaderStage::Vertex)?;
        check_stage(&pixel, ShaderStage::Pixel)?;
        if let Some(geometry) = &geometry {
            check_stage(geometry, ShaderStage::Geometry)?;
        }

        let dep_val = DependencyToken::new();
        dep_val.register_dependent(Arc::clone(vertex.dependency_validation()));
        dep_val.register_dependent(Arc::clone(pixel.dependency_validation()));
        if let Some(geometry) = &geometry {
            dep_val.register_dependent(Arc::clone(geometry.dependency_validation()));
        }

        Ok(Self {
            vertex,
            pixel,
            geometry,
            dep_val,
        })
    }

    fn members(&self) -> impl Iterator<Item = &Arc<CompiledShaderByteCode>> {
        [&self.vertex, &self.pixel]
            .into_iter()
            .chain(self.geometry.as_ref())
    }

    #[inline]
    #[must_use]
    pub fn vertex(&self) -> &Arc<CompiledShaderByteCode> {
        &self.vertex
    }

    #[inline]
    #[must_use]
    pub fn pixel(&self) -> &Arc<CompiledShaderByteCode> {
        &self.pixel
    }

    #[inline]
    #[must_use]
    pub fn geometry(&self) -> Option<&Arc<CompiledShaderByteCode>> {
        self.geometry.as_ref()
    }

    /// `Invalid` if any member is invalid, else `Pending` if any member is
    /// pending, else `Ready`.
    #[must_use]
    pub fn asset_state(&self) -> AssetState {
        combine(self.members().map(|member| member.get_asset_state()))
    }

    /// Blocks until every member is terminal.
    pub fn stall_while_pending(&self) -> AssetState {
        combine(self.members().map(|member| member.stall_while_pending()))
    }

    /// Waits for every member concurrently.
    pub async fn resolve_async(&self) -> AssetState {
        let states = futures::future::join_all(self.members().map(|m| m.resolve_async())).await;
        combine(states.into_iter())
    }

    /// Stale as soon as any member's dependencies are stale.
    #[inline]
    #[must_use]
    pub fn dependency_validation(&self) -> &DepValPtr {
        &self.dep_val
    }

    #[must_use]
    pub fn dynamic_linking_enabled(&self) -> bool {
        self.members().any(|member| member.dynamic_linking_enabled())
    }
}

fn check_stage(handle: &CompiledShaderByteCode, expected: ShaderStage) -> Result<()> {
    let found = handle.stage();
    if found == expected || found == ShaderStage::Null {
        Ok(())
    } else {
        Err(ShaderError::StageMismatch {
            initializer: handle.initializer().to_string(),
            expected,
            found,
        })
    }
}

fn combine(states: impl Iterator<Item = AssetState>) -> AssetState {
    let mut combined = AssetState::Ready;
    for state in states {
        match state {
            AssetState::Invalid => combined = AssetState::Invalid,
            AssetState::Pending if combined == AssetState::Ready => combined = AssetState::Pending,
            _ => {}
        }
    }
    combined
}

//! Image table
//!
//! Images outlive frames and are destroyed explicitly. Each entry pairs
//! canvas-side metadata with a backend texture; externally created
//! textures are wrapped unowned so destroy leaves them alone.

use verve_core::{ImageHandle, TextureId};

use crate::context::Context;

/// One image table entry
#[derive(Clone, Copy, Debug)]
pub struct Image {
    pub width: u16,
    pub height: u16,
    pub sampler_flags: u32,
    pub texture: TextureId,
    /// Whether the context owns (and destroys) the backend texture
    pub owned: bool,
}

impl Image {
    fn empty() -> Self {
        Image {
            width: 0,
            height: 0,
            sampler_flags: 0,
            texture: TextureId::INVALID,
            owned: false,
        }
    }
}

impl Context {
    /// Create an image, optionally with initial RGBA8 contents. Returns
    /// an invalid handle at capacity.
    pub fn create_image(
        &mut self,
        width: u16,
        height: u16,
        sampler_flags: u32,
        data: Option<&[u8]>,
    ) -> ImageHandle {
        self.create_image_internal(width, height, sampler_flags, data, true)
    }

    /// Wrap an externally created backend texture. The texture is not
    /// destroyed with the image.
    pub fn create_image_from_texture(&mut self, texture: TextureId, sampler_flags: u32) -> ImageHandle {
        debug_assert!(texture.is_valid(), "invalid backend texture");
        let handle = self.alloc_image_slot();
        if !handle.is_valid() {
            return ImageHandle::INVALID;
        }

        self.images[handle.idx as usize] = Image {
            width: u16::MAX,
            height: u16::MAX,
            sampler_flags,
            texture,
            owned: false,
        };
        handle
    }

    pub(crate) fn create_image_internal(
        &mut self,
        width: u16,
        height: u16,
        sampler_flags: u32,
        data: Option<&[u8]>,
        owned: bool,
    ) -> ImageHandle {
        let handle = self.alloc_image_slot();
        if !handle.is_valid() {
            return ImageHandle::INVALID;
        }

        let texture = self.backend.create_texture(width, height, sampler_flags, data);
        self.images[handle.idx as usize] = Image {
            width,
            height,
            sampler_flags,
            texture,
            owned,
        };
        handle
    }

    /// Update a sub-rectangle with tightly packed RGBA8 pixels.
    pub fn update_image(
        &mut self,
        handle: ImageHandle,
        x: u16,
        y: u16,
        w: u16,
        h: u16,
        data: &[u8],
    ) -> bool {
        if !self.is_image_valid(handle) {
            return false;
        }
        let texture = self.images[handle.idx as usize].texture;
        self.backend.update_texture(texture, x, y, w, h, data);
        true
    }

    pub fn destroy_image(&mut self, handle: ImageHandle) -> bool {
        if !handle.is_valid() || !self.image_handles.is_valid(handle.idx) {
            return false;
        }

        let image = self.images[handle.idx as usize];
        if image.owned && image.texture.is_valid() {
            self.backend.destroy_texture(image.texture);
        }
        self.images[handle.idx as usize] = Image::empty();
        self.image_handles.free(handle.idx);
        true
    }

    pub fn is_image_valid(&self, handle: ImageHandle) -> bool {
        handle.is_valid()
            && self.image_handles.is_valid(handle.idx)
            && self.images[handle.idx as usize].texture.is_valid()
    }

    /// Image dimensions, or `None` for a stale handle.
    pub fn image_size(&self, handle: ImageHandle) -> Option<(u16, u16)> {
        if !self.is_image_valid(handle) {
            return None;
        }
        let image = &self.images[handle.idx as usize];
        Some((image.width, image.height))
    }

    pub(crate) fn image(&self, handle: ImageHandle) -> Option<&Image> {
        if !handle.is_valid() || !self.image_handles.is_valid(handle.idx) {
            return None;
        }
        self.images.get(handle.idx as usize)
    }

    /// Replace an image's backing texture at a new size, keeping the
    /// handle stable (the font atlas grows this way).
    pub(crate) fn realloc_image(&mut self, handle: ImageHandle, width: u16, height: u16) {
        if !handle.is_valid() || !self.image_handles.is_valid(handle.idx) {
            return;
        }
        let old = self.images[handle.idx as usize];
        if old.owned && old.texture.is_valid() {
            self.backend.destroy_texture(old.texture);
        }
        let texture = self.backend.create_texture(width, height, old.sampler_flags, None);
        self.images[handle.idx as usize] = Image {
            width,
            height,
            sampler_flags: old.sampler_flags,
            texture,
            owned: true,
        };
    }

    fn alloc_image_slot(&mut self) -> ImageHandle {
        let idx = self.image_handles.alloc();
        if idx == u16::MAX {
            return ImageHandle::INVALID;
        }
        while self.images.len() <= idx as usize {
            self.images.push(Image::empty());
        }
        ImageHandle::new(idx)
    }
}

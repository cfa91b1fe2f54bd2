use tracing::debug;

use crate::cache::{RingStore, ShardUploader, UploadTarget};
use crate::error::Error;
use crate::events::Image;

/// GPU storage behind both ring stores: one 2D-array texture per shard per
/// store, each array layer holding one ring slot.
#[derive(Debug)]
pub struct TextureArrayUploader {
    queue: wgpu::Queue,
    width: u32,
    height: u32,
    // [buffer][shard]
    shards: [Vec<wgpu::Texture>; 2],
}

impl TextureArrayUploader {
    /// Allocate textures matching the shard layout of `layout`.
    pub fn new<T>(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        layout: &RingStore<T>,
        width: u32,
        height: u32,
    ) -> Self {
        let make_store = |buffer: usize| -> Vec<wgpu::Texture> {
            (0..layout.shard_count())
                .map(|shard| {
                    let layers = layout.shard_len(shard) as u32;
                    debug!(buffer, shard, layers, "allocating shard texture");
                    device.create_texture(&wgpu::TextureDescriptor {
                        label: Some("image-wall-shard"),
                        size: wgpu::Extent3d {
                            width,
                            height,
                            depth_or_array_layers: layers,
                        },
                        mip_level_count: 1,
                        sample_count: 1,
                        dimension: wgpu::TextureDimension::D2,
                        format: wgpu::TextureFormat::Rgba8UnormSrgb,
                        usage: wgpu::TextureUsages::TEXTURE_BINDING
                            | wgpu::TextureUsages::COPY_DST,
                        view_formats: &[],
                    })
                })
                .collect()
        };
        Self {
            queue: queue.clone(),
            width,
            height,
            shards: [make_store(0), make_store(1)],
        }
    }

    pub fn texture(&self, buffer: usize, shard: usize) -> Option<&wgpu::Texture> {
        self.shards.get(buffer).and_then(|store| store.get(shard))
    }
}

impl ShardUploader for TextureArrayUploader {
    fn upload(&mut self, target: UploadTarget, image: &Image) -> Result<(), Error> {
        let expected = (self.width, self.height);
        if image.dimensions() != expected {
            return Err(Error::DimensionMismatch {
                expected,
                actual: image.dimensions(),
            });
        }
        if image.pixels.len() != self.width as usize * self.height as usize * 4 {
            return Err(Error::Upload {
                target,
                reason: format!("pixel buffer holds {} bytes", image.pixels.len()),
            });
        }
        let texture = self.texture(target.buffer, target.shard).ok_or_else(|| Error::Upload {
            target,
            reason: "no such shard texture".into(),
        })?;
        if target.slot as u32 >= texture.depth_or_array_layers() {
            return Err(Error::Upload {
                target,
                reason: "slot outside shard".into(),
            });
        }

        self.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture,
                mip_level: 0,
                origin: wgpu::Origin3d {
                    x: 0,
                    y: 0,
                    z: target.slot as u32,
                },
                aspect: wgpu::TextureAspect::All,
            },
            &image.pixels,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(4 * self.width),
                rows_per_image: Some(self.height),
            },
            wgpu::Extent3d {
                width: self.width,
                height: self.height,
                depth_or_array_layers: 1,
            },
        );
        Ok(())
    }
}

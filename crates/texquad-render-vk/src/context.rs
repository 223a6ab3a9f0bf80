//! Instance-level and device-level Vulkan objects.
use anyhow::{anyhow, bail, Context, Result};
use ash::ext::debug_utils;
use ash::khr::{surface, swapchain};
use ash::{vk, Entry};
use raw_window_handle::{HasDisplayHandle, HasWindowHandle, RawDisplayHandle};
use std::ffi::{c_char, c_void, CStr};
use std::rc::Rc;
use tracing::{debug, error, info, trace, warn};

use crate::swapchain::SurfaceSupport;

const VALIDATION_LAYER: &CStr = c"VK_LAYER_KHRONOS_validation";

unsafe extern "system" fn debug_callback(
    severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    _types: vk::DebugUtilsMessageTypeFlagsEXT,
    data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    _user: *mut c_void,
) -> vk::Bool32 {
    if data.is_null() || (*data).p_message.is_null() {
        return vk::FALSE;
    }
    let msg = CStr::from_ptr((*data).p_message).to_string_lossy();
    if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR) {
        error!("[vulkan] {msg}");
    } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING) {
        warn!("[vulkan] {msg}");
    } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::INFO) {
        debug!("[vulkan] {msg}");
    } else {
        trace!("[vulkan] {msg}");
    }
    vk::FALSE
}

unsafe fn create_instance(
    entry: &Entry,
    display: RawDisplayHandle,
    validation: bool,
) -> Result<ash::Instance> {
    let name = c"texquad";
    let app_info = vk::ApplicationInfo {
        s_type: vk::StructureType::APPLICATION_INFO,
        p_application_name: name.as_ptr(),
        application_version: vk::make_api_version(0, 1, 0, 0),
        p_engine_name: c"No Engine".as_ptr(),
        engine_version: vk::make_api_version(0, 1, 0, 0),
        api_version: vk::API_VERSION_1_0,
        ..Default::default()
    };

    let mut extensions = ash_window::enumerate_required_extensions(display)
        .context("enumerate_required_extensions")?
        .to_vec();
    let mut layers: Vec<*const c_char> = Vec::new();

    if validation {
        let available = entry
            .enumerate_instance_layer_properties()
            .context("enumerate_instance_layer_properties")?;
        let found = available
            .iter()
            .any(|l| CStr::from_ptr(l.layer_name.as_ptr()) == VALIDATION_LAYER);
        if !found {
            bail!("validation layers requested, but not available");
        }
        layers.push(VALIDATION_LAYER.as_ptr());
        extensions.push(debug_utils::NAME.as_ptr());
    }

    let create_info = vk::InstanceCreateInfo {
        s_type: vk::StructureType::INSTANCE_CREATE_INFO,
        p_application_info: &app_info,
        enabled_extension_count: extensions.len() as u32,
        pp_enabled_extension_names: extensions.as_ptr(),
        enabled_layer_count: layers.len() as u32,
        pp_enabled_layer_names: layers.as_ptr(),
        ..Default::default()
    };

    Ok(entry.create_instance(&create_info, None)?)
}

unsafe fn create_debug_messenger(
    entry: &Entry,
    instance: &ash::Instance,
) -> Result<(debug_utils::Instance, vk::DebugUtilsMessengerEXT)> {
    let loader = debug_utils::Instance::new(entry, instance);
    let ci = vk::DebugUtilsMessengerCreateInfoEXT {
        s_type: vk::StructureType::DEBUG_UTILS_MESSENGER_CREATE_INFO_EXT,
        message_severity: vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE
            | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
            | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
        message_type: vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
            | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
            | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
        pfn_user_callback: Some(debug_callback),
        ..Default::default()
    };
    let messenger = loader
        .create_debug_utils_messenger(&ci, None)
        .context("create_debug_utils_messenger")?;
    Ok((loader, messenger))
}

/// Loader, instance, optional debug messenger and the window surface.
pub struct InstanceContext {
    pub entry: Entry,
    pub instance: ash::Instance,
    debug: Option<(debug_utils::Instance, vk::DebugUtilsMessengerEXT)>,
    pub surface_loader: surface::Instance,
    pub surface: vk::SurfaceKHR,
}

impl InstanceContext {
    pub fn new(
        window: &dyn HasWindowHandle,
        display: &dyn HasDisplayHandle,
        validation: bool,
    ) -> Result<Self> {
        let dh = display
            .display_handle()
            .map_err(|e| anyhow!("{e}"))?
            .as_raw();
        let wh = window
            .window_handle()
            .map_err(|e| anyhow!("{e}"))?
            .as_raw();

        // instance, then debug messenger, then the surface from this instance
        unsafe {
            let entry = Entry::load().context("load Vulkan library")?;
            let instance = create_instance(&entry, dh, validation).context("create_instance")?;
            let surface_loader = surface::Instance::new(&entry, &instance);

            // from here on Drop owns cleanup
            let mut ctx = Self {
                entry,
                instance,
                debug: None,
                surface_loader,
                surface: vk::SurfaceKHR::null(),
            };

            if validation {
                ctx.debug = Some(create_debug_messenger(&ctx.entry, &ctx.instance)?);
            }

            ctx.surface = ash_window::create_surface(&ctx.entry, &ctx.instance, dh, wh, None)
                .context("create_surface")?;

            Ok(ctx)
        }
    }
}

impl Drop for InstanceContext {
    fn drop(&mut self) {
        unsafe {
            if self.surface != vk::SurfaceKHR::null() {
                self.surface_loader.destroy_surface(self.surface, None);
            }
            if let Some((loader, messenger)) = self.debug.take() {
                loader.destroy_debug_utils_messenger(messenger, None);
            }
            self.instance.destroy_instance(None);
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct QueueFamilies {
    pub graphics: u32,
    pub present: u32,
}

impl QueueFamilies {
    pub fn unique(&self) -> Vec<u32> {
        if self.graphics == self.present {
            vec![self.graphics]
        } else {
            vec![self.graphics, self.present]
        }
    }

    /// Picks a graphics family and a present family, preferring one family that does both.
    pub fn select(graphics_capable: &[bool], present_capable: &[bool]) -> Option<Self> {
        let both = (0..graphics_capable.len())
            .find(|&i| graphics_capable[i] && present_capable.get(i).copied().unwrap_or(false));
        if let Some(i) = both {
            return Some(Self {
                graphics: i as u32,
                present: i as u32,
            });
        }
        let graphics = graphics_capable.iter().position(|&g| g)?;
        let present = present_capable.iter().position(|&p| p)?;
        Some(Self {
            graphics: graphics as u32,
            present: present as u32,
        })
    }
}

unsafe fn find_queue_families(
    inst: &InstanceContext,
    phys: vk::PhysicalDevice,
) -> Result<Option<QueueFamilies>> {
    let props = inst
        .instance
        .get_physical_device_queue_family_properties(phys);
    let graphics: Vec<bool> = props
        .iter()
        .map(|q| q.queue_flags.contains(vk::QueueFlags::GRAPHICS))
        .collect();
    let mut present = Vec::with_capacity(props.len());
    for i in 0..props.len() {
        present.push(
            inst.surface_loader
                .get_physical_device_surface_support(phys, i as u32, inst.surface)
                .context("get_physical_device_surface_support")?,
        );
    }
    Ok(QueueFamilies::select(&graphics, &present))
}

unsafe fn supports_swapchain(instance: &ash::Instance, phys: vk::PhysicalDevice) -> Result<bool> {
    let exts = instance
        .enumerate_device_extension_properties(phys)
        .context("enumerate_device_extension_properties")?;
    Ok(exts
        .iter()
        .any(|e| CStr::from_ptr(e.extension_name.as_ptr()) == swapchain::NAME))
}

unsafe fn pick_physical_device(inst: &InstanceContext) -> Result<(vk::PhysicalDevice, QueueFamilies)> {
    let devices = inst
        .instance
        .enumerate_physical_devices()
        .context("enumerate_physical_devices")?;
    if devices.is_empty() {
        bail!("failed to find GPUs with Vulkan support");
    }

    for phys in devices {
        let Some(families) = find_queue_families(inst, phys)? else {
            continue;
        };
        if !supports_swapchain(&inst.instance, phys)? {
            continue;
        }
        let support = SurfaceSupport::query(&inst.surface_loader, phys, inst.surface)?;
        if support.formats.is_empty() || support.present_modes.is_empty() {
            continue;
        }
        return Ok((phys, families));
    }
    bail!("failed to find a suitable GPU")
}

/// Logical device, its queues and the swapchain loader. Owns the instance group
/// so the device is always destroyed first.
pub struct DeviceContext {
    pub device: ash::Device,
    pub phys: vk::PhysicalDevice,
    pub families: QueueFamilies,
    pub graphics_queue: vk::Queue,
    pub present_queue: vk::Queue,
    pub swapchain_loader: swapchain::Device,
    pub memory_props: vk::PhysicalDeviceMemoryProperties,
    /// Max anisotropy when the feature was enabled.
    pub anisotropy: Option<f32>,
    pub instance: InstanceContext,
}

impl DeviceContext {
    pub fn new(instance: InstanceContext) -> Result<Rc<Self>> {
        unsafe {
            let (phys, families) = pick_physical_device(&instance)?;
            let props = instance.instance.get_physical_device_properties(phys);
            let name = CStr::from_ptr(props.device_name.as_ptr()).to_string_lossy();
            info!(
                "gpu: {name} (graphics family {}, present family {})",
                families.graphics, families.present
            );

            let priorities = [1.0_f32];
            let queue_infos: Vec<_> = families
                .unique()
                .into_iter()
                .map(|family| vk::DeviceQueueCreateInfo {
                    s_type: vk::StructureType::DEVICE_QUEUE_CREATE_INFO,
                    queue_family_index: family,
                    queue_count: 1,
                    p_queue_priorities: priorities.as_ptr(),
                    ..Default::default()
                })
                .collect();

            let supported = instance.instance.get_physical_device_features(phys);
            let features = vk::PhysicalDeviceFeatures {
                sampler_anisotropy: supported.sampler_anisotropy,
                ..Default::default()
            };
            let anisotropy = (supported.sampler_anisotropy == vk::TRUE)
                .then_some(props.limits.max_sampler_anisotropy);

            let device_exts = [swapchain::NAME.as_ptr()];
            let dinfo = vk::DeviceCreateInfo {
                s_type: vk::StructureType::DEVICE_CREATE_INFO,
                queue_create_info_count: queue_infos.len() as u32,
                p_queue_create_infos: queue_infos.as_ptr(),
                enabled_extension_count: device_exts.len() as u32,
                pp_enabled_extension_names: device_exts.as_ptr(),
                p_enabled_features: &features,
                ..Default::default()
            };

            let device = instance
                .instance
                .create_device(phys, &dinfo, None)
                .context("create_device")?;

            let graphics_queue = device.get_device_queue(families.graphics, 0);
            let present_queue = device.get_device_queue(families.present, 0);
            let swapchain_loader = swapchain::Device::new(&instance.instance, &device);
            let memory_props = instance
                .instance
                .get_physical_device_memory_properties(phys);

            Ok(Rc::new(Self {
                device,
                phys,
                families,
                graphics_queue,
                present_queue,
                swapchain_loader,
                memory_props,
                anisotropy,
                instance,
            }))
        }
    }

    pub fn surface_support(&self) -> Result<SurfaceSupport> {
        unsafe {
            SurfaceSupport::query(
                &self.instance.surface_loader,
                self.phys,
                self.instance.surface,
            )
        }
    }
}

impl Drop for DeviceContext {
    fn drop(&mut self) {
        unsafe {
            self.device.device_wait_idle().ok();
            self.device.destroy_device(None);
        }
    }
}

/// Device-level handle destroyed on drop, keeping the device alive until then.
pub struct DeviceOwned<T: Copy> {
    ctx: Rc<DeviceContext>,
    raw: T,
    destroy: unsafe fn(&ash::Device, T),
}

impl<T: Copy> DeviceOwned<T> {
    pub fn new(ctx: &Rc<DeviceContext>, raw: T, destroy: unsafe fn(&ash::Device, T)) -> Self {
        Self {
            ctx: Rc::clone(ctx),
            raw,
            destroy,
        }
    }

    pub fn raw(&self) -> T {
        self.raw
    }
}

impl<T: Copy> Drop for DeviceOwned<T> {
    fn drop(&mut self) {
        unsafe { (self.destroy)(&self.ctx.device, self.raw) }
    }
}

pub(crate) unsafe fn destroy_semaphore(device: &ash::Device, raw: vk::Semaphore) {
    device.destroy_semaphore(raw, None);
}

pub(crate) unsafe fn destroy_fence(device: &ash::Device, raw: vk::Fence) {
    device.destroy_fence(raw, None);
}

pub(crate) unsafe fn destroy_command_pool(device: &ash::Device, raw: vk::CommandPool) {
    device.destroy_command_pool(raw, None);
}

pub(crate) unsafe fn destroy_descriptor_pool(device: &ash::Device, raw: vk::DescriptorPool) {
    device.destroy_descriptor_pool(raw, None);
}

pub(crate) unsafe fn destroy_set_layout(device: &ash::Device, raw: vk::DescriptorSetLayout) {
    device.destroy_descriptor_set_layout(raw, None);
}

/// Resettable pool on the graphics family. Per-frame and one-shot command
/// buffers both come from here.
pub fn create_command_pool(ctx: &Rc<DeviceContext>) -> Result<DeviceOwned<vk::CommandPool>> {
    let info = vk::CommandPoolCreateInfo {
        s_type: vk::StructureType::COMMAND_POOL_CREATE_INFO,
        flags: vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER,
        queue_family_index: ctx.families.graphics,
        ..Default::default()
    };
    let pool = unsafe { ctx.device.create_command_pool(&info, None) }
        .context("create_command_pool")?;
    Ok(DeviceOwned::new(ctx, pool, destroy_command_pool))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefers_family_with_both_capabilities() {
        let f = QueueFamilies::select(&[true, true], &[false, true]).unwrap();
        assert_eq!(f.graphics, 1);
        assert_eq!(f.present, 1);
        assert_eq!(f.unique(), vec![1]);
    }

    #[test]
    fn falls_back_to_separate_families() {
        let f = QueueFamilies::select(&[true, false], &[false, true]).unwrap();
        assert_eq!((f.graphics, f.present), (0, 1));
        assert_eq!(f.unique(), vec![0, 1]);
    }

    #[test]
    fn missing_capability_yields_none() {
        assert_eq!(QueueFamilies::select(&[false, false], &[true, true]), None);
        assert_eq!(QueueFamilies::select(&[true], &[false]), None);
    }
}

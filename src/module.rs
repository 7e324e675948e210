//! `Module`, `ModulePackages` and `ModuleMainClass` decoding.

use std::rc::Rc;

use crate::class::{AccessFlags, ClassReader};
use crate::error::Result;
use crate::visitor::ClassVisitor;

/// Decode the three module attributes and drive the module visitor. Events
/// follow the on-disk layout: main class, packages, requires, exports, opens,
/// uses, provides.
pub(crate) fn read_module_attributes(
    reader: &ClassReader,
    visitor: &mut dyn ClassVisitor,
    module_offset: usize,
    packages_offset: Option<usize>,
    main_class: Option<Rc<str>>,
) -> Result<()> {
    let cur = reader.cur();
    let pool = reader.pool();
    let mut offset = module_offset;

    let name = pool.module_name(cur, cur.u16(offset)?, offset)?;
    let flags = AccessFlags::from_bits_truncate(u32::from(cur.u16(offset + 2)?));
    let version = match cur.u16(offset + 4)? {
        0 => None,
        index => Some(pool.utf8(cur, index, offset + 4)?),
    };
    offset += 6;

    let module_visitor = match visitor.visit_module(&name, flags, version.as_deref()) {
        Some(v) => v,
        None => return Ok(()),
    };

    if let Some(main_class) = main_class {
        module_visitor.visit_main_class(&main_class);
    }

    if let Some(mut packages_offset) = packages_offset {
        let mut package_count = cur.u16(packages_offset)?;
        packages_offset += 2;
        while package_count > 0 {
            let package = pool.package_name(cur, cur.u16(packages_offset)?, packages_offset)?;
            module_visitor.visit_package(&package);
            packages_offset += 2;
            package_count -= 1;
        }
    }

    let mut requires_count = cur.u16(offset)?;
    offset += 2;
    while requires_count > 0 {
        let module = pool.module_name(cur, cur.u16(offset)?, offset)?;
        let flags = AccessFlags::from_bits_truncate(u32::from(cur.u16(offset + 2)?));
        let version = match cur.u16(offset + 4)? {
            0 => None,
            index => Some(pool.utf8(cur, index, offset + 4)?),
        };
        module_visitor.visit_require(&module, flags, version.as_deref());
        offset += 6;
        requires_count -= 1;
    }

    let mut exports_count = cur.u16(offset)?;
    offset += 2;
    while exports_count > 0 {
        let package = pool.package_name(cur, cur.u16(offset)?, offset)?;
        let flags = AccessFlags::from_bits_truncate(u32::from(cur.u16(offset + 2)?));
        let mut target_count = cur.u16(offset + 4)?;
        offset += 6;

        let mut targets = Vec::with_capacity(target_count as usize);
        while target_count > 0 {
            targets.push(pool.module_name(cur, cur.u16(offset)?, offset)?);
            offset += 2;
            target_count -= 1;
        }
        module_visitor.visit_export(&package, flags, &targets);
        exports_count -= 1;
    }

    let mut opens_count = cur.u16(offset)?;
    offset += 2;
    while opens_count > 0 {
        let package = pool.package_name(cur, cur.u16(offset)?, offset)?;
        let flags = AccessFlags::from_bits_truncate(u32::from(cur.u16(offset + 2)?));
        let mut target_count = cur.u16(offset + 4)?;
        offset += 6;

        let mut targets = Vec::with_capacity(target_count as usize);
        while target_count > 0 {
            targets.push(pool.module_name(cur, cur.u16(offset)?, offset)?);
            offset += 2;
            target_count -= 1;
        }
        module_visitor.visit_open(&package, flags, &targets);
        opens_count -= 1;
    }

    let mut uses_count = cur.u16(offset)?;
    offset += 2;
    while uses_count > 0 {
        let service = pool.class_name(cur, cur.u16(offset)?, offset)?;
        module_visitor.visit_use(&service);
        offset += 2;
        uses_count -= 1;
    }

    let mut provides_count = cur.u16(offset)?;
    offset += 2;
    while provides_count > 0 {
        let service = pool.class_name(cur, cur.u16(offset)?, offset)?;
        let mut provider_count = cur.u16(offset + 2)?;
        offset += 4;

        let mut providers = Vec::with_capacity(provider_count as usize);
        while provider_count > 0 {
            providers.push(pool.class_name(cur, cur.u16(offset)?, offset)?);
            offset += 2;
            provider_count -= 1;
        }
        module_visitor.visit_provide(&service, &providers);
        provides_count -= 1;
    }

    module_visitor.visit_end();
    Ok(())
}

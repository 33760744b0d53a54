use crate::cmd::{load_catalog, ServicesArgs};
use crate::exit::{catalog_error, CliResult, SUCCESS};
use crate::output::{print_services, OutputFormat, ServiceRow};

pub fn run(args: ServicesArgs, format: OutputFormat) -> CliResult<i32> {
    let catalog = load_catalog(&args.services)?;

    let mut rows = Vec::new();
    for service in catalog.services() {
        let messages = service
            .resolved_messages()
            .map_err(|err| catalog_error("listing services", err))?;
        for (order_number, message) in messages {
            rows.push(ServiceRow {
                service_id: service.service_id,
                service: service.name.clone(),
                order_number,
                name: message.name.clone(),
                fields: message
                    .fields
                    .iter()
                    .map(|field| format!("{}:{}", field.name, field.ty.as_str()))
                    .collect(),
            });
        }
    }
    rows.sort_by_key(|row| (row.service_id, row.order_number));

    print_services(&rows, format);
    Ok(SUCCESS)
}

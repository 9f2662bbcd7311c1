//! XML order document.

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

use drawx_core::{DocumentResult, ExtractedItem, HoleSpec, OrderResult, ToleratedLength};

type XmlWriter = Writer<Vec<u8>>;

pub fn render_order(order: &OrderResult) -> anyhow::Result<String> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

    start(&mut writer, "Order")?;
    text_element(&mut writer, "OrderNumber", &order.order_id)?;
    text_element(&mut writer, "Customer", order.customer.canonical_name())?;
    if let Some(guess) = &order.customer_guess {
        let confidence = guess.confidence.to_string();
        writer.write_event(Event::Start(
            BytesStart::new("CustomerDetection").with_attributes([("confidence", confidence.as_str())]),
        ))?;
        writer.write_event(Event::Text(BytesText::new(&guess.rationale)))?;
        end(&mut writer, "CustomerDetection")?;
    }
    text_element(&mut writer, "Model", &order.model)?;
    text_element(&mut writer, "GeneratedAt", &order.generated_at.to_rfc3339())?;
    text_element(&mut writer, "Assembly", order.assembly.as_deref().unwrap_or("None"))?;

    start(&mut writer, "Items")?;
    for document in &order.documents {
        write_document(&mut writer, document)?;
    }
    end(&mut writer, "Items")?;
    end(&mut writer, "Order")?;

    Ok(String::from_utf8(writer.into_inner())?)
}

fn write_document(writer: &mut XmlWriter, document: &DocumentResult) -> anyhow::Result<()> {
    let status = if document.is_success() { "ok" } else { "failed" };
    writer.write_event(Event::Start(
        BytesStart::new("Item").with_attributes([("source", document.source.as_str()), ("status", status)]),
    ))?;

    if let Some(item) = document.item() {
        write_item(writer, item)?;
        if !document.warnings().is_empty() {
            start(writer, "PDF_Warnings")?;
            for warning in document.warnings() {
                text_element(writer, "Message", warning)?;
            }
            end(writer, "PDF_Warnings")?;
        }
    }
    if let Some(reason) = document.failure() {
        text_element(writer, "Error", &reason.to_string())?;
    }

    end(writer, "Item")
}

fn write_item(writer: &mut XmlWriter, item: &ExtractedItem) -> anyhow::Result<()> {
    text_element(writer, "PartNumber", item.part_number.as_deref().unwrap_or_default())?;
    if let Some(description) = &item.description {
        text_element(writer, "Description", description)?;
    }
    text_element(writer, "Material", item.material.as_deref().unwrap_or_default())?;
    text_element(
        writer,
        "SurfaceTreatment",
        item.surface_treatment.as_deref().unwrap_or("None"),
    )?;

    if !item.holes.is_empty() {
        start(writer, "Holes")?;
        for hole in &item.holes {
            write_hole(writer, hole)?;
        }
        end(writer, "Holes")?;
    }

    if !item.tolerated_lengths.is_empty() {
        start(writer, "ToleratedLengths")?;
        for length in &item.tolerated_lengths {
            write_length(writer, length)?;
        }
        end(writer, "ToleratedLengths")?;
    }

    if !item.bom_part_numbers.is_empty() {
        start(writer, "BomPartNumbers")?;
        for part_number in &item.bom_part_numbers {
            text_element(writer, "PartNumber", part_number)?;
        }
        end(writer, "BomPartNumbers")?;
    }

    Ok(())
}

fn write_hole(writer: &mut XmlWriter, hole: &HoleSpec) -> anyhow::Result<()> {
    let count = hole.quantity().to_string();
    let mut element = BytesStart::new("Hole");
    element.push_attribute(("type", hole.kind.as_str()));
    element.push_attribute(("count", count.as_str()));
    for (name, value) in [
        ("diameter", &hole.diameter),
        ("threadSize", &hole.thread_size),
        ("tolerance", &hole.tolerance),
        ("upperTolerance", &hole.upper_tolerance),
        ("lowerTolerance", &hole.lower_tolerance),
        ("depth", &hole.depth),
    ] {
        if let Some(value) = value {
            element.push_attribute((name, value.as_str()));
        }
    }
    writer.write_event(Event::Empty(element))?;
    Ok(())
}

fn write_length(writer: &mut XmlWriter, length: &ToleratedLength) -> anyhow::Result<()> {
    let mut element = BytesStart::new("Length");
    for (name, value) in [
        ("dimension", &length.dimension),
        ("toleranceType", &length.tolerance_type),
        ("upperTolerance", &length.upper_tolerance),
        ("lowerTolerance", &length.lower_tolerance),
    ] {
        if let Some(value) = value {
            element.push_attribute((name, value.as_str()));
        }
    }
    writer.write_event(Event::Empty(element))?;
    Ok(())
}

fn start(writer: &mut XmlWriter, name: &str) -> anyhow::Result<()> {
    writer.write_event(Event::Start(BytesStart::new(name)))?;
    Ok(())
}

fn end(writer: &mut XmlWriter, name: &str) -> anyhow::Result<()> {
    writer.write_event(Event::End(BytesEnd::new(name)))?;
    Ok(())
}

fn text_element(writer: &mut XmlWriter, name: &str, text: &str) -> anyhow::Result<()> {
    start(writer, name)?;
    writer.write_event(Event::Text(BytesText::new(text)))?;
    end(writer, name)
}

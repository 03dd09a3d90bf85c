use std::io::{self, Write};

pub fn show_menu(profile: &str) {
    println!("\n===========================================");
    println!("Line Tower Robot (profile: {profile})");
    println!("===========================================");
    println!("Select an option:");
    println!("1. Competition Run");
    println!("2. Tower Only");
    println!("3. Show Run Profile");
    println!("4. Exit");
    println!("===========================================");
    print!("Choice (1-4): ");
}

pub fn get_user_choice() -> io::Result<Option<u32>> {
    io::stdout().flush()?;
    let mut input = String::new();
    if io::stdin().read_line(&mut input)? == 0 {
        return Err(io::ErrorKind::UnexpectedEof.into());
    }
    Ok(input.trim().parse::<u32>().ok())
}

/// Block until the operator confirms the robot is in its start position.
pub fn wait_for_confirm(what: &str) -> io::Result<()> {
    println!("\nPlace the robot for the {what} and press Enter to start...");
    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(())
}

pub fn wait_for_enter() -> io::Result<()> {
    println!("\nPress Enter to return to menu...");
    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(())
}
